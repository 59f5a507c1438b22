use super::*;

#[test]
fn new_checks_length() {
    assert!(Raster::new(2, 2, vec![0; 16], false).is_ok());
    assert!(Raster::new(2, 2, vec![0; 15], false).is_err());
    assert!(AlphaMask::new(3, 2, vec![0; 6]).is_ok());
    assert!(AlphaMask::new(3, 2, vec![0; 5]).is_err());
}

#[test]
fn transparent_raster_is_premultiplied_zero() {
    let r = Raster::transparent(4, 3);
    assert!(r.premultiplied);
    assert_eq!(r.byte_len(), 48);
    assert!(r.is_fully_transparent());
}

#[test]
fn straight_image_round_trips_through_premultiplied_output() {
    let mut img = image::RgbaImage::new(1, 1);
    img.put_pixel(0, 0, image::Rgba([200, 100, 50, 255]));
    let r = Raster::from_straight_image(img);
    assert!(!r.premultiplied);
    assert_eq!(r.pixel(0, 0), [200, 100, 50, 255]);

    let premul = Raster::filled(1, 1, Rgba8Premul::from_straight_rgba(200, 100, 50, 128));
    let back = premul.to_straight_image().unwrap();
    let px = back.get_pixel(0, 0).0;
    assert_eq!(px[3], 128);
    assert!((i32::from(px[0]) - 200).abs() <= 1);
    assert!((i32::from(px[1]) - 100).abs() <= 1);
}

#[test]
fn mask_coverage_sum_counts_weights() {
    let m = AlphaMask::new(2, 1, vec![255, 10]).unwrap();
    assert_eq!(m.coverage_sum(), 265);
    assert_eq!(m.get(1, 0), 10);
}
