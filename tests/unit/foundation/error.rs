use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ScaleError::unsupported_format("x")
            .to_string()
            .contains("unsupported pixel format:")
    );
    assert!(
        ScaleError::buffer_too_small("x")
            .to_string()
            .contains("buffer too small:")
    );
    assert!(
        ScaleError::not_supported("x")
            .to_string()
            .contains("not supported:")
    );
    assert!(
        ScaleError::disposed("x")
            .to_string()
            .contains("use of disposed resource:")
    );
    assert!(
        ScaleError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        ScaleError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ScaleError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
