use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u16(1, 127), 0);
    assert_eq!(mul_div255_u16(1, 128), 1);
    assert_eq!(mul_div255_u8(0, 200), 0);
}

#[test]
fn unit_to_u8_clamps_and_rejects_nan() {
    assert_eq!(unit_to_u8(-1.0), 0);
    assert_eq!(unit_to_u8(2.0), 255);
    assert_eq!(unit_to_u8(0.5), 128);
    assert_eq!(unit_to_u8(f64::NAN), 0);
}

#[test]
fn smoothstep_is_monotone_and_clamped() {
    assert_eq!(smoothstep(0.0, 1.0, -0.5), 0.0);
    assert_eq!(smoothstep(0.0, 1.0, 1.5), 1.0);
    assert_eq!(smoothstep(0.0, 1.0, 0.5), 0.5);
    let mut prev = 0.0;
    for i in 0..=20 {
        let v = smoothstep(0.0, 1.0, f64::from(i) / 20.0);
        assert!(v >= prev);
        prev = v;
    }
    assert_eq!(smoothstep(2.0, 2.0, 1.0), 0.0);
    assert_eq!(smoothstep(2.0, 2.0, 2.0), 1.0);
}

#[test]
fn lerp_hits_endpoints() {
    assert_eq!(lerp(10.0, 20.0, 0.0), 10.0);
    assert_eq!(lerp(10.0, 20.0, 1.0), 20.0);
    assert_eq!(lerp(10.0, 20.0, 0.25), 12.5);
}
