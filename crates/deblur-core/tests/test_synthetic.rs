use deblur_core::synthetic::{
    bars, checkerboard, circle, gradient, pink_field, GradientDirection,
};

#[test]
fn checkerboard_alternates_cells() {
    let img = checkerboard(64, 8);
    assert_eq!(img[[0, 0]], 0.0);
    assert_eq!(img[[0, 8]], 1.0);
    assert_eq!(img[[8, 0]], 1.0);
    assert_eq!(img[[8, 8]], 0.0);
    assert!(img.iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn gradient_ramps_from_zero_to_one() {
    let img = gradient(32, GradientDirection::Horizontal);
    assert_eq!(img[[0, 0]], 0.0);
    assert!((img[[0, 31]] - 1.0).abs() < 1e-6);
    assert!(img[[5, 10]] < img[[5, 20]]);

    let img = gradient(32, GradientDirection::Vertical);
    assert!(img[[10, 5]] < img[[20, 5]]);
}

#[test]
fn circle_is_white_inside_and_black_in_corners() {
    let img = circle(64, 0.3);
    assert_eq!(img[[32, 32]], 1.0);
    assert_eq!(img[[0, 0]], 0.0);
    assert_eq!(img[[0, 63]], 0.0);
}

#[test]
fn bars_repeat_at_twice_the_bar_width() {
    let img = bars(64, 8);
    assert_eq!(img[[0, 0]], 1.0);
    assert_eq!(img[[0, 8]], 0.0);
    assert_eq!(img[[0, 16]], 1.0);
    // Constant along rows.
    for row in 1..64 {
        assert_eq!(img[[row, 3]], img[[0, 3]]);
    }
}

#[test]
fn pink_field_is_normalized_and_reproducible() {
    let a = pink_field(64, 1.0, 123);
    let b = pink_field(64, 1.0, 123);
    assert_eq!(a, b);
    assert!(a.iter().all(|&v| (0.0..=1.0).contains(&v)));
    let min = a.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = a.iter().cloned().fold(f32::MIN, f32::max);
    assert_eq!(min, 0.0);
    assert!((max - 1.0).abs() < 1e-6);
}

#[test]
fn pink_field_has_low_frequency_structure() {
    // Neighboring pixels of a 1/f field correlate far more than a white
    // checkerboard's do: compare mean absolute neighbor difference to range.
    let img = pink_field(64, 1.5, 7);
    let mut diff_sum = 0.0f64;
    let mut count = 0usize;
    for row in 0..64 {
        for col in 0..63 {
            diff_sum += (img[[row, col + 1]] - img[[row, col]]).abs() as f64;
            count += 1;
        }
    }
    let mean_diff = diff_sum / count as f64;
    assert!(
        mean_diff < 0.2,
        "1/f field should be locally smooth, mean neighbor diff = {mean_diff}"
    );
}
