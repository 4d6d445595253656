use super::*;

fn gradient(width: u32, height: u32) -> MemorySource {
    let data = (0..width * height).map(|v| v as u8).collect();
    MemorySource::new(width, height, PixelFormat::Grey8, data).unwrap()
}

#[test]
fn check_region_rejects_out_of_bounds() {
    let buf = [0u8; 16];
    let err = check_region(4, 4, PixelFormat::Grey8, PixelArea::new(2, 0, 3, 1), 4, &buf)
        .unwrap_err();
    assert!(matches!(err, ScaleError::Validation(_)));
}

#[test]
fn check_region_rejects_short_stride_and_buffer() {
    let buf = [0u8; 16];
    let area = PixelArea::new(0, 0, 2, 2);
    let err = check_region(4, 4, PixelFormat::Bgr24, area, 5, &buf).unwrap_err();
    assert!(matches!(err, ScaleError::BufferTooSmall(_)));
    let err = check_region(4, 4, PixelFormat::Bgr24, area, 12, &buf).unwrap_err();
    assert!(matches!(err, ScaleError::BufferTooSmall(_)));
    check_region(4, 4, PixelFormat::Bgr24, area, 6, &buf).unwrap();
}

#[test]
fn memory_source_copies_subregion_with_stride() {
    let mut src = gradient(4, 3);
    let mut dst = [0xAAu8; 6];
    src.fill_region(PixelArea::new(1, 1, 2, 2), 3, &mut dst).unwrap();
    assert_eq!(dst, [5, 6, 0xAA, 9, 10, 0xAA]);
}

#[test]
fn memory_source_rejects_short_data() {
    let err = MemorySource::new(4, 4, PixelFormat::Bgra32, vec![0; 63]).unwrap_err();
    assert!(matches!(err, ScaleError::BufferTooSmall(_)));
    let err = MemorySource::new(0, 4, PixelFormat::Grey8, Vec::new()).unwrap_err();
    assert!(matches!(err, ScaleError::Validation(_)));
}

#[test]
fn memory_source_honors_source_stride() {
    let data = vec![1, 2, 0, 3, 4, 0];
    let mut src = MemorySource::with_stride(2, 2, PixelFormat::Grey8, 3, data).unwrap();
    let mut dst = [0u8; 4];
    src.fill_region(PixelArea::full(2, 2), 2, &mut dst).unwrap();
    assert_eq!(dst, [1, 2, 3, 4]);
}

#[test]
fn profiled_counts_successful_pulls_only() {
    let profiler = Arc::new(SourceProfiler::new("MemorySource"));
    let mut src = Profiled::new(Box::new(gradient(4, 4)), Arc::clone(&profiler));
    let mut dst = [0u8; 16];
    src.fill_region(PixelArea::full(4, 4), 4, &mut dst).unwrap();
    assert!(src.fill_region(PixelArea::new(3, 3, 2, 2), 4, &mut dst).is_err());
    let stats = profiler.stats();
    assert_eq!(stats.calls, 2);
    assert_eq!(stats.pixels, 16);
}

#[test]
fn upstream_pauses_consumer_clock() {
    struct Slow;
    impl PixelSource for Slow {
        fn name(&self) -> &str {
            "Slow"
        }
        fn width(&self) -> u32 {
            1
        }
        fn height(&self) -> u32 {
            1
        }
        fn format(&self) -> PixelFormat {
            PixelFormat::Grey8
        }
        fn fill_region(&mut self, _: PixelArea, _: usize, _: &mut [u8]) -> ScaleResult<()> {
            std::thread::sleep(std::time::Duration::from_millis(30));
            Ok(())
        }
    }

    let consumer = Arc::new(SourceProfiler::new("Consumer"));
    let mut up = Upstream::new(Box::new(Slow)).with_consumer(Some(Arc::clone(&consumer)));
    let mut px = [0u8; 1];
    consumer.start();
    up.fill_region(PixelArea::full(1, 1), 1, &mut px).unwrap();
    consumer.stop(1);
    assert!(consumer.stats().elapsed < std::time::Duration::from_millis(30));
    assert_eq!(up.into_inner().name(), "Slow");
}
