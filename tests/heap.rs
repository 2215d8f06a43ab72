use segfit::{Error, Heap, HeapConfig, HeapSource, Ptr, VecSource};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn default_heap() {
    init_logger();
    let mut heap: Heap<VecSource> = Heap::init(VecSource::default()).unwrap();

    let p = heap.allocate(32).unwrap();
    assert_eq!(p.addr() % segfit::ALIGNMENT, 0);
    heap.payload_mut(p)[..3].copy_from_slice(b"abc");
    assert_eq!(&heap.payload(p)[..3], b"abc");
    heap.free(p);

    assert_eq!(heap.validate(true), Ok(()));
    assert_eq!(heap.lo(), 0);
    assert_eq!(heap.hi(), heap.source().memory().len() - 1);
}

#[test]
fn many_objects() {
    init_logger();
    let mut heap: Heap<VecSource> = Heap::init(VecSource::default()).unwrap();

    let ptrs: Vec<(Ptr, u8)> = (0..1000)
        .map(|i| {
            let len = 1 + (i * 37) % 300;
            let p = heap.allocate(len).unwrap();
            heap.payload_mut(p)[..len].fill(i as u8);
            (p, i as u8)
        })
        .collect();
    assert_eq!(heap.validate(false), Ok(()));
    assert_eq!(heap.stats().allocated_blocks, 1000);

    for (i, &(p, fill)) in ptrs.iter().enumerate() {
        let len = 1 + (i * 37) % 300;
        assert!(heap.payload(p)[..len].iter().all(|&b| b == fill));
    }

    // Free every other one, then the rest
    for &(p, _) in ptrs.iter().step_by(2) {
        heap.free(p);
    }
    assert_eq!(heap.validate(false), Ok(()));
    for &(p, _) in ptrs.iter().skip(1).step_by(2) {
        heap.free(p);
    }
    assert_eq!(heap.validate(false), Ok(()));

    let stats = heap.stats();
    assert_eq!(stats.allocated_blocks, 0);
    assert_eq!(stats.free_blocks, 1);
}

#[test]
fn realloc_chain() {
    init_logger();
    let mut heap: Heap<VecSource> = Heap::init(VecSource::default()).unwrap();

    let mut p = heap.allocate(1).unwrap();
    heap.payload_mut(p)[0] = 42;
    for size in (2..4000).step_by(97) {
        p = heap.resize(p, size).unwrap();
        assert_eq!(heap.payload(p)[0], 42);
    }
    assert_eq!(heap.resize(p, 0), None);
    assert_eq!(heap.stats().allocated_blocks, 0);
    assert_eq!(heap.validate(false), Ok(()));
}

#[test]
fn cannot_allocate_beyond_cap() {
    init_logger();
    let mut heap: Heap<VecSource> = Heap::init(VecSource::new(4096)).unwrap();

    assert!(heap.allocate(8192).is_none());
    assert!(matches!(
        heap.try_allocate(8192),
        Err(Error::OutOfMemory { .. })
    ));
    assert!(heap.allocate(1000).is_some());
    assert_eq!(heap.validate(false), Ok(()));
}

#[test]
fn cannot_allocate_max_usize() {
    let mut heap: Heap<VecSource> = Heap::init(VecSource::default()).unwrap();
    assert!(heap.allocate(usize::MAX).is_none());
    assert!(heap.allocate(usize::MAX - 8).is_none());
    assert!(heap.allocate_zeroed(usize::MAX / 2, 3).is_none());
}

#[test]
fn borrowed_source() {
    init_logger();
    let mut source = VecSource::new(1 << 16);
    {
        let config = HeapConfig::default().with_initial_chunk(4096);
        let mut heap = Heap::with_config(&mut source, config, ()).unwrap();
        let p = heap.allocate_zeroed(16, 16).unwrap();
        assert!(heap.payload(p)[..256].iter().all(|&b| b == 0));
        assert_eq!(heap.validate(false), Ok(()));
    }
    assert!(source.memory().len() >= 128 + 4096);
}

/// A source whose first bytes belong to someone else.
struct Reserved {
    mem: Vec<u8>,
    reserved: usize,
}

impl Reserved {
    fn new(reserved: usize) -> Self {
        Self {
            mem: vec![0x77; reserved],
            reserved,
        }
    }
}

impl HeapSource for Reserved {
    fn grow(&mut self, bytes: usize) -> Option<usize> {
        let old_len = self.mem.len();
        self.mem.resize(old_len + bytes, 0);
        Some(old_len)
    }

    fn memory(&self) -> &[u8] {
        &self.mem
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }
}

#[test]
fn heap_after_reserved_bytes() {
    init_logger();
    let mut heap: Heap<Reserved> = Heap::init(Reserved::new(0x1001)).unwrap();
    assert_eq!(heap.lo(), 0x1008);
    assert_eq!(heap.validate(true), Ok(()));

    let ptrs: Vec<Ptr> = (1..100).map(|i| heap.allocate(i * 24).unwrap()).collect();
    for &p in &ptrs {
        assert_eq!(p.addr() % segfit::ALIGNMENT, 0);
        assert!(p.addr() > heap.lo());
    }
    for p in ptrs {
        heap.free(p);
    }
    assert_eq!(heap.validate(false), Ok(()));
    assert_eq!(heap.stats().free_blocks, 1);

    let source = heap.source();
    assert!(source.mem[..source.reserved].iter().all(|&b| b == 0x77));
}

#[cfg(unix)]
#[test]
fn mmap_source() {
    use segfit::MmapSource;

    init_logger();
    let source = MmapSource::new(1 << 20).unwrap();
    let mut heap: Heap<MmapSource> = Heap::init(source).unwrap();

    let mut ptrs = Vec::new();
    for i in 0..200 {
        let p = heap.allocate(1 + i * 13).unwrap();
        heap.payload_mut(p).fill(0xcc);
        ptrs.push(p);
    }
    for p in ptrs.drain(..).rev() {
        heap.free(p);
    }
    assert_eq!(heap.validate(true), Ok(()));

    // Runs out at the end of the mapping
    assert!(heap.allocate(2 << 20).is_none());
    assert_eq!(heap.validate(false), Ok(()));
}
