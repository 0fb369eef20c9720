use posture_video::convert::yuyv_to_rgb;

#[test]
fn test_yuyv_gray_maps_to_gray() {
    // neutral chroma: Y passes straight through
    let data = [100, 128, 200, 128];
    let frame = yuyv_to_rgb(&data, 2, 1).expect("convert");
    assert_eq!(frame.data(), &[100, 100, 100, 200, 200, 200]);
}

#[test]
fn test_yuyv_clamps() {
    let data = [255, 255, 0, 255];
    let frame = yuyv_to_rgb(&data, 2, 1).unwrap();
    assert_eq!(frame.pixel(0, 0).unwrap()[0], 255);
    assert_eq!(frame.pixel(1, 0).unwrap()[1], 0);
}

#[test]
fn test_yuyv_rejects_short_or_odd_input() {
    assert!(yuyv_to_rgb(&[0; 6], 2, 2).is_err());
    assert!(yuyv_to_rgb(&[0; 12], 3, 2).is_err());
}
