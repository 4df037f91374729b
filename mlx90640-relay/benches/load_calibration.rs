use criterion::{criterion_group, criterion_main, Criterion};

use mlx90640_relay::CalibrationSet;
use mlx90640_relay_test_data::{mlx90640_datasheet_eeprom, with_pixel_words};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Calibration Loading");

    group.bench_with_input("datasheet", &mlx90640_datasheet_eeprom(), |b, eeprom| {
        b.iter(|| CalibrationSet::from_eeprom(eeprom))
    });
    // Flagged pixels add the pairwise adjacency checks
    let flagged = with_pixel_words(
        with_pixel_words(mlx90640_datasheet_eeprom(), &[10, 300], 0),
        &[100, 500],
        0x08a1,
    );
    group.bench_with_input("flagged pixels", &flagged, |b, eeprom| {
        b.iter(|| CalibrationSet::from_eeprom(eeprom))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
