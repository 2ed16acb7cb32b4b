//! Shared test doubles: a scriptable video effects SDK and a host source.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::time::Duration;

use vfx_denoise::{
    CvImage, DenoiseInstance, Effect, EffectHandle, FilterConfig, FilterFactory, FilterSource,
    ImageSlot, RunStatus, SdkError, SharedSdk, VideoEffectsSdk,
};
use vfx_gpu::{
    CaptureState, CpuDevice, CpuTexture, GpuResult, GraphicsDevice, NativeTexture, ScopedContext,
    Size, TextureFormat,
};

pub const WAIT: Duration = Duration::from_secs(10);

// =============================================================================
// Mock SDK
// =============================================================================

/// Counters and failure switches shared by every SDK the loader creates.
#[derive(Default)]
pub struct MockState {
    pub loader_calls: AtomicUsize,
    pub sdk_drops: AtomicUsize,
    pub effect_creates: AtomicUsize,
    pub effect_destroys: AtomicUsize,
    pub effect_loads: AtomicUsize,
    pub binds: AtomicUsize,
    pub runs: AtomicUsize,
    pub inits: AtomicUsize,
    pub maps: AtomicUsize,
    pub unmaps: AtomicUsize,
    pub deallocs: AtomicUsize,
    /// Calls made without both contexts entered.
    pub context_violations: AtomicUsize,
    pub cuda_depth: AtomicUsize,

    pub fail_loader: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_map: AtomicBool,
    pub fail_unmap: AtomicBool,
    pub run_empty: AtomicBool,

    /// Graphics device that must be entered around SDK calls.
    pub graphics: OnceLock<Arc<CpuDevice>>,
    gate: Gate,
    next_handle: AtomicUsize,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }

    /// Make `effect_create` block until [`release_loads`](Self::release_loads).
    pub fn hold_loads(&self) {
        self.gate.close();
    }

    pub fn release_loads(&self) {
        self.gate.open();
    }

    /// Images currently allocated.
    pub fn live_images(&self) -> usize {
        Self::count(&self.inits) - Self::count(&self.deallocs)
    }

    fn check_contexts(&self) {
        let gfx_entered = self
            .graphics
            .get()
            .is_none_or(|device| device.context_depth() > 0);
        if !gfx_entered || self.cuda_depth.load(Ordering::SeqCst) == 0 {
            self.context_violations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst) as u64 + 1
    }
}

#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    fn open(&self) {
        *self.closed.lock().unwrap() = false;
        self.cond.notify_all();
    }

    fn pass(&self) {
        let closed = self.closed.lock().unwrap();
        let _unused = self.cond.wait_while(closed, |c| *c).unwrap();
    }
}

/// CUDA stand-in that tracks how deeply it is entered.
pub struct MockContext {
    state: Arc<MockState>,
}

impl ScopedContext for MockContext {
    fn enter(&self) -> GpuResult<()> {
        let gfx_entered = self
            .state
            .graphics
            .get()
            .is_none_or(|device| device.context_depth() > 0);
        if !gfx_entered {
            self.state.context_violations.fetch_add(1, Ordering::SeqCst);
        }
        self.state.cuda_depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn leave(&self) {
        self.state.cuda_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockSdk {
    state: Arc<MockState>,
    context: MockContext,
}

impl MockSdk {
    /// A shared SDK whose loader builds mocks over `state`.
    pub fn shared(state: &Arc<MockState>) -> SharedSdk {
        let state = Arc::clone(state);
        SharedSdk::new(move || {
            state.loader_calls.fetch_add(1, Ordering::SeqCst);
            if state.fail_loader.load(Ordering::SeqCst) {
                return Err(SdkError::new(-2, "library not found"));
            }
            Ok(Arc::new(MockSdk {
                state: Arc::clone(&state),
                context: MockContext {
                    state: Arc::clone(&state),
                },
            }) as Arc<dyn VideoEffectsSdk>)
        })
    }
}

impl Drop for MockSdk {
    fn drop(&mut self) {
        self.state.sdk_drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl VideoEffectsSdk for MockSdk {
    fn compute_context(&self) -> &dyn ScopedContext {
        &self.context
    }

    fn image_init(&self, texture: NativeTexture, size: Size) -> Result<CvImage, SdkError> {
        self.state.check_contexts();
        self.state.inits.fetch_add(1, Ordering::SeqCst);
        Ok(CvImage::new(self.state.handle(), texture, size))
    }

    fn image_map(&self, image: &mut CvImage) -> Result<(), SdkError> {
        self.state.check_contexts();
        if self.state.fail_map.load(Ordering::SeqCst) {
            return Err(SdkError::new(3, "map failed"));
        }
        self.state.maps.fetch_add(1, Ordering::SeqCst);
        image.mapped = true;
        Ok(())
    }

    fn image_unmap(&self, image: &mut CvImage) -> Result<(), SdkError> {
        self.state.check_contexts();
        self.state.unmaps.fetch_add(1, Ordering::SeqCst);
        image.mapped = false;
        if self.state.fail_unmap.load(Ordering::SeqCst) {
            return Err(SdkError::new(4, "unmap failed"));
        }
        Ok(())
    }

    fn image_dealloc(&self, image: &mut CvImage) {
        self.state.check_contexts();
        self.state.deallocs.fetch_add(1, Ordering::SeqCst);
        *image = CvImage::default();
    }

    fn effect_create(&self, selector: &str) -> Result<EffectHandle, SdkError> {
        assert_eq!(selector, "Denoising");
        self.state.gate.pass();
        self.state.check_contexts();
        self.state.effect_creates.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(SdkError::new(-7, "effect library missing"));
        }
        Ok(EffectHandle(self.state.handle()))
    }

    fn effect_set_image(&self, _effect: EffectHandle, _slot: ImageSlot, image: &CvImage) -> Result<(), SdkError> {
        self.state.check_contexts();
        assert!(image.mapped, "bound an unmapped image");
        self.state.binds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn effect_load(&self, _effect: EffectHandle) -> Result<(), SdkError> {
        self.state.check_contexts();
        self.state.effect_loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn effect_run(&self, _effect: EffectHandle) -> Result<RunStatus, SdkError> {
        self.state.check_contexts();
        self.state.runs.fetch_add(1, Ordering::SeqCst);
        if self.state.run_empty.load(Ordering::SeqCst) {
            Ok(RunStatus::Empty)
        } else {
            Ok(RunStatus::Produced)
        }
    }

    fn effect_destroy(&self, _effect: EffectHandle) {
        self.state.check_contexts();
        self.state.effect_destroys.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Mock host
// =============================================================================

/// What the host saw while the upstream was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub size: Size,
    pub target: Option<Size>,
    pub state: CaptureState,
    pub framebuffer_srgb: bool,
}

/// Upstream source of a fixed size and color.
pub struct TestSource {
    device: Arc<CpuDevice>,
    pub size: Option<(u32, u32)>,
    pub color: [u8; 4],
    pub accept: AtomicBool,
    pub skips: AtomicUsize,
    pub begins: AtomicUsize,
    pub captures: Mutex<Vec<Capture>>,
}

impl TestSource {
    pub fn new(device: &Arc<CpuDevice>, size: Option<(u32, u32)>) -> Self {
        Self {
            device: Arc::clone(device),
            size,
            color: [200, 100, 50, 255],
            accept: AtomicBool::new(true),
            skips: AtomicUsize::new(0),
            begins: AtomicUsize::new(0),
            captures: Mutex::new(Vec::new()),
        }
    }

    pub fn skips(&self) -> usize {
        self.skips.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> Vec<Capture> {
        self.captures.lock().unwrap().clone()
    }
}

impl FilterSource<CpuDevice> for TestSource {
    fn target_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn skip_video_filter(&self) {
        self.skips.fetch_add(1, Ordering::SeqCst);
    }

    fn process_filter_begin(&self, format: TextureFormat, allow_direct: bool) -> bool {
        assert_eq!(format, TextureFormat::Rgba8Unorm);
        assert!(allow_direct);
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.accept.load(Ordering::SeqCst)
    }

    fn process_filter_end(&self, size: Size) {
        let target = self.device.current_render_target();
        self.captures.lock().unwrap().push(Capture {
            size,
            target: target.as_ref().map(|t| t.desc().size),
            state: self.device.capture_state(),
            framebuffer_srgb: self.device.framebuffer_srgb(),
        });
        if let Some(target) = target {
            target.fill(self.color);
        }
    }
}

/// Draw effect with a fixed number of passes.
pub struct TestEffect {
    pub passes: usize,
    remaining: Option<usize>,
    pub techniques: Vec<String>,
    pub bound: Vec<(Arc<CpuTexture>, bool)>,
}

impl TestEffect {
    pub fn new(passes: usize) -> Self {
        Self {
            passes,
            remaining: None,
            techniques: Vec::new(),
            bound: Vec::new(),
        }
    }
}

impl Effect<Arc<CpuTexture>> for TestEffect {
    fn set_image(&mut self, texture: &Arc<CpuTexture>, srgb: bool) {
        self.bound.push((Arc::clone(texture), srgb));
    }

    fn next_pass(&mut self, technique: &str) -> bool {
        self.techniques.push(technique.to_string());
        let remaining = self.remaining.get_or_insert(self.passes);
        if *remaining == 0 {
            self.remaining = None;
            return false;
        }
        *remaining -= 1;
        true
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Factory over a mock SDK, one worker thread.
pub fn factory(state: &Arc<MockState>) -> Arc<FilterFactory> {
    let config = FilterConfig {
        worker_threads: 1,
        thread_name: "denoise-test".into(),
        ..FilterConfig::default()
    };
    Arc::new(FilterFactory::new(config, MockSdk::shared(state)).unwrap())
}

/// Device whose context entry the mock checks.
pub fn device(state: &Arc<MockState>) -> Arc<CpuDevice> {
    let device = Arc::new(CpuDevice::new());
    let _ = state.graphics.set(Arc::clone(&device));
    device
}

/// Block the pool's only worker until the returned sender is dropped.
pub fn block_pool(factory: &FilterFactory) -> std::sync::mpsc::Sender<()> {
    let (tx, rx) = std::sync::mpsc::channel::<()>();
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    factory.pool().spawn(move || {
        started_tx.send(()).unwrap();
        let _ = rx.recv();
    });
    started_rx.recv().unwrap();
    tx
}

pub fn wait_idle<G: GraphicsDevice>(instance: &DenoiseInstance<G>) {
    assert!(instance.wait_idle(WAIT), "provider switch did not finish");
}
