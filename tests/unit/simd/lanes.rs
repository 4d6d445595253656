use super::*;

fn exercise<L: Lanes>() {
    let n = L::LANES;
    let src: Vec<f32> = (0..n).map(|i| i as f32).collect();
    let v = L::load(&src);
    let mut out = vec![0.0f32; n];

    v.mul_add(L::splat(2.0), L::splat(1.0)).store(&mut out);
    for (i, &o) in out.iter().enumerate() {
        assert_eq!(o, i as f32 * 2.0 + 1.0);
    }

    L::splat(10.0).mul_add_mem(L::splat(0.5), &src).store(&mut out);
    for (i, &o) in out.iter().enumerate() {
        assert_eq!(o, 10.0 + i as f32 * 0.5);
    }

    L::lerp(L::splat(2.0), L::splat(4.0), L::splat(0.25)).store(&mut out);
    assert!(out.iter().all(|&o| o == 2.5));

    let mask = v.eq_mask(L::splat(2.0));
    L::blend(mask, L::splat(9.0), v).store(&mut out);
    assert_eq!(out[0], 0.0);
    assert_eq!(out[1], 1.0);
    assert_eq!(out[2], 9.0);

    let expected: f32 = src.iter().sum();
    assert_eq!(v.hsum(), expected);

    L::splat(-4.0).max(L::splat(0.0)).sqrt().store(&mut out);
    assert!(out.iter().all(|&o| o == 0.0));
    L::splat(16.0).sqrt().store(&mut out);
    assert!(out.iter().all(|&o| o == 4.0));

    let eq = v.eq_mask(L::splat(0.0));
    L::blend(eq, L::splat(1.0), L::splat(0.0)).store(&mut out);
    assert_eq!(out[0], 1.0);
    assert!(out[1..].iter().all(|&o| o == 0.0));
}

#[test]
fn narrow_lanes_primitives() {
    exercise::<f32x4>();
}

#[test]
fn wide_lanes_primitives() {
    exercise::<f32x8>();
}

#[test]
fn detection_is_consistent() {
    let level = SimdLevel::detect();
    assert_eq!(level, SimdLevel::detect());
    assert_eq!(is_wide_supported(), level == SimdLevel::V256);
    if is_wide_supported() {
        assert!(is_supported());
    }
    assert_eq!(vector_count::<f32>(), level.register_bytes() / 4);
    assert!(vector_count::<f32>() >= 4);
    assert_eq!(SimdLevel::Portable.lanes_of::<f32>(), 4);
    assert_eq!(SimdLevel::V256.lanes_of::<u16>(), 16);
}

#[test]
fn dispatch_macro_picks_matching_width() {
    let lanes = with_lanes!(SimdLevel::detect(), L => L::LANES);
    assert_eq!(lanes, vector_count::<f32>());
    assert_eq!(with_lanes!(SimdLevel::Portable, L => L::LANES), 4);
    assert_eq!(with_lanes!(SimdLevel::V256, L => L::LANES), 8);
}
