use super::*;

#[test]
fn zero_sigma_is_identity() {
    let src = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
    let out = gaussian_blur_rgba8_premul(&src, 1, 2, 0.0).unwrap();
    assert_eq!(out, src);
}

#[test]
fn constant_image_is_identity() {
    let (w, h) = (4u32, 3u32);
    let px = [10u8, 20u8, 30u8, 40u8];
    let src = px.repeat((w * h) as usize);
    let out = gaussian_blur_rgba8_premul(&src, w, h, 1.5).unwrap();
    assert_eq!(out, src);
}

#[test]
fn blur_spreads_energy_from_single_pixel() {
    let (w, h) = (7u32, 7u32);
    let mut src = vec![0u8; (w * h * 4) as usize];
    let center = ((3 * w + 3) * 4) as usize;
    src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

    let out = gaussian_blur_rgba8_premul(&src, w, h, 0.8).unwrap();

    let nonzero = out.chunks_exact(4).filter(|px| px[3] != 0).count();
    assert!(nonzero > 1);
    let sum_a: u32 = out.chunks_exact(4).map(|px| u32::from(px[3])).sum();
    assert!((sum_a as i32 - 255).abs() <= 6);
}

#[test]
fn motion_kernel_is_capped() {
    assert_eq!(motion_kernel_len(0.0), 0);
    assert_eq!(motion_kernel_len(20.0), 10);
    assert_eq!(motion_kernel_len(10_000.0), MAX_MOTION_KERNEL_PX);
}

#[test]
fn slow_motion_is_identity_without_padding() {
    let src = vec![255u8; 4 * 4 * 4];
    let (out, w, h, pad) = motion_blur_rgba8_premul(&src, 4, 4, Vec2::new(1.0, 0.0)).unwrap();
    assert_eq!((w, h, pad), (4, 4, 0));
    assert_eq!(out, src);
}

#[test]
fn horizontal_motion_streaks_along_x_only() {
    let (w, h) = (5u32, 5u32);
    let mut src = vec![0u8; (w * h * 4) as usize];
    let center = ((2 * w + 2) * 4) as usize;
    src[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

    let (out, ow, oh, pad) =
        motion_blur_rgba8_premul(&src, w, h, Vec2::new(20.0, 0.0)).unwrap();
    assert_eq!(ow, w + 2 * pad);
    assert_eq!(oh, h + 2 * pad);

    let cy = 2 + pad;
    for oy in 0..oh {
        for ox in 0..ow {
            let a = out[((oy * ow + ox) * 4 + 3) as usize];
            if oy != cy {
                assert_eq!(a, 0, "unexpected alpha at ({ox},{oy})");
            }
        }
    }
    let row_nonzero = (0..ow)
        .filter(|&ox| out[((cy * ow + ox) * 4 + 3) as usize] != 0)
        .count();
    assert!(row_nonzero > 1);
}
