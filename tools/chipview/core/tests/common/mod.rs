#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use chipview_core::backend::{
    BackendKind, BackendProbe, BufferDesc, BufferId, DrawCall, GraphicsBackend, PipelineDesc, PipelineId, ResourceId,
    SamplerDesc, SamplerId, Slots, TextureDesc, TextureId, TextureRegion,
};
use chipview_core::engine::{Engine, TickOutput};
use chipview_core::error::{RenderError, ShaderStage};
use chipview_core::render_loop::{AudioCue, Host};
use futures::future::LocalBoxFuture;
use futures::FutureExt;

/// Live object counts per tier, shared by every scripted backend in a test.
#[derive(Clone, Default)]
pub struct Ledger(Rc<RefCell<LedgerInner>>);

#[derive(Default)]
pub struct LedgerInner {
    live: HashMap<BackendKind, usize>,
    created: HashMap<BackendKind, usize>,
    pub uploads: Vec<Vec<u8>>,
    pub draws: Vec<DrawCall>,
    pub backends_dropped: u32,
}

impl Ledger {
    pub fn live(&self, kind: BackendKind) -> usize {
        self.0.borrow().live.get(&kind).copied().unwrap_or(0)
    }

    pub fn created(&self, kind: BackendKind) -> usize {
        self.0.borrow().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn uploads(&self) -> Vec<Vec<u8>> {
        self.0.borrow().uploads.clone()
    }

    pub fn backends_dropped(&self) -> u32 {
        self.0.borrow().backends_dropped
    }

    pub fn draws(&self) -> usize {
        self.0.borrow().draws.len()
    }

    fn add(&self, kind: BackendKind) {
        let mut inner = self.0.borrow_mut();
        *inner.live.entry(kind).or_default() += 1;
        *inner.created.entry(kind).or_default() += 1;
    }

    fn remove(&self, kind: BackendKind) {
        let mut inner = self.0.borrow_mut();
        let live = inner.live.entry(kind).or_default();
        *live = live.checked_sub(1).expect("released more objects than were created");
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    None,
    Texture,
    VertexCompile,
    Link,
}

pub struct ScriptedBackend {
    kind: BackendKind,
    ledger: Ledger,
    fault: Fault,
    objects: Slots<()>,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind, ledger: Ledger, fault: Fault) -> Self {
        Self { kind, ledger, fault, objects: Slots::default() }
    }

    fn track(&mut self) -> u32 {
        self.ledger.add(self.kind);
        self.objects.insert(())
    }
}

impl Drop for ScriptedBackend {
    fn drop(&mut self) {
        // objects still alive here were never released: they stay counted as live
        self.ledger.0.borrow_mut().backends_dropped += 1;
    }
}

impl GraphicsBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, RenderError> {
        assert_eq!(desc.size % self.buffer_alignment(), 0, "unaligned buffer {}", desc.label);
        Ok(BufferId(self.track()))
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId, RenderError> {
        if self.fault == Fault::Texture {
            return Err(RenderError::resource("texture", format!("{}x{} too large", desc.width, desc.height)));
        }
        Ok(TextureId(self.track()))
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc) -> Result<SamplerId, RenderError> {
        Ok(SamplerId(self.track()))
    }

    fn create_pipeline(&mut self, _desc: &PipelineDesc<'_>) -> Result<PipelineId, RenderError> {
        match self.fault {
            Fault::VertexCompile => Err(RenderError::ShaderCompileFailure {
                stage: ShaderStage::Vertex,
                log: "ERROR: 0:1: 'aVertCoord' : undeclared identifier".into(),
            }),
            Fault::Link => Err(RenderError::ProgramLinkFailure { log: "varying vTexCoord not written".into() }),
            _ => Ok(PipelineId(self.track())),
        }
    }

    fn upload(&mut self, _texture: TextureId, region: &TextureRegion, bytes: &[u8]) -> Result<(), RenderError> {
        assert_eq!(bytes.len(), (region.bytes_per_row * region.height) as usize);
        self.ledger.0.borrow_mut().uploads.push(bytes.to_vec());
        Ok(())
    }

    fn submit_frame(&mut self, draw: &DrawCall) -> Result<(), RenderError> {
        self.ledger.0.borrow_mut().draws.push(*draw);
        Ok(())
    }

    fn release(&mut self, id: ResourceId) {
        let raw = match id {
            ResourceId::Buffer(BufferId(raw))
            | ResourceId::Texture(TextureId(raw))
            | ResourceId::Sampler(SamplerId(raw))
            | ResourceId::Pipeline(PipelineId(raw)) => raw,
        };
        if self.objects.remove(raw).is_some() {
            self.ledger.remove(self.kind);
        }
    }

    fn live_resources(&self) -> usize {
        self.objects.len()
    }
}

#[derive(Clone)]
pub enum ProbeScript {
    Unavailable(&'static str),
    /// The probe validates its shaders itself and one of them fails.
    ShaderRejected(ShaderStage, &'static str),
    Acquire(Fault),
}

pub struct ScriptedProbe {
    kind: BackendKind,
    ledger: Ledger,
    script: ProbeScript,
    pub attempts: Rc<Cell<u32>>,
}

impl ScriptedProbe {
    pub fn boxed(kind: BackendKind, ledger: &Ledger, script: ProbeScript) -> Box<dyn BackendProbe> {
        Self::counted(kind, ledger, script).0
    }

    pub fn counted(kind: BackendKind, ledger: &Ledger, script: ProbeScript) -> (Box<dyn BackendProbe>, Rc<Cell<u32>>) {
        let attempts = Rc::new(Cell::new(0));
        let probe = Self { kind, ledger: ledger.clone(), script, attempts: attempts.clone() };
        (Box::new(probe), attempts)
    }
}

impl BackendProbe for ScriptedProbe {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn acquire(&mut self) -> LocalBoxFuture<'_, Result<Box<dyn GraphicsBackend>, RenderError>> {
        self.attempts.set(self.attempts.get() + 1);
        let result: Result<Box<dyn GraphicsBackend>, RenderError> = match self.script {
            ProbeScript::Unavailable(reason) => Err(RenderError::unavailable(self.kind, reason)),
            ProbeScript::ShaderRejected(stage, log) => {
                Err(RenderError::ShaderCompileFailure { stage, log: log.to_owned() })
            }
            ProbeScript::Acquire(fault) => Ok(Box::new(ScriptedBackend::new(self.kind, self.ledger.clone(), fault))),
        };
        async move { result }.boxed_local()
    }
}

/// Engine that replays a fixed list of tick results.
pub struct ScriptedEngine {
    pub width: u32,
    pub height: u32,
    pub vram: Vec<u8>,
    pub script: VecDeque<TickOutput>,
    pub ticks: u32,
    pub steps: u32,
    pub keys: u16,
    pub rom: Vec<u8>,
}

impl ScriptedEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            vram: vec![0; (width * height) as usize],
            script: VecDeque::new(),
            ticks: 0,
            steps: 0,
            keys: 0,
            rom: Vec::new(),
        }
    }

    /// `k` quiet ticks followed by one redraw.
    pub fn redraw_after(mut self, k: usize) -> Self {
        self.script.extend(std::iter::repeat(TickOutput::default()).take(k));
        self.script.push_back(TickOutput { vram: true, beep: false });
        self
    }
}

impl Engine for ScriptedEngine {
    fn load(&mut self, rom: &[u8]) {
        self.rom = rom.to_vec();
        // make each ROM's frames recognisable
        let marker = rom.first().copied().unwrap_or(0);
        self.vram.iter_mut().for_each(|px| *px = marker);
    }

    fn next(&mut self) -> bool {
        self.steps += 1;
        !self.script.is_empty()
    }

    fn tick(&mut self) -> TickOutput {
        self.ticks += 1;
        self.script.pop_front().unwrap_or_default()
    }

    fn set_key(&mut self, code: u8) {
        self.keys |= 1 << code;
    }

    fn unset_key(&mut self, code: u8) {
        self.keys &= !(1 << code);
    }

    fn vram(&self) -> &[u8] {
        &self.vram
    }

    fn vram_width(&self) -> u32 {
        self.width
    }

    fn vram_height(&self) -> u32 {
        self.height
    }
}

#[derive(Clone, Default)]
pub struct Beeps(pub Rc<Cell<u32>>);

impl AudioCue for Beeps {
    fn beep(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

/// Host whose pauses complete immediately and optionally run a hook, the way
/// an input event or ROM selection would run while a callback is suspended.
#[derive(Default)]
pub struct TestHost {
    pub pauses: Cell<u32>,
    pub frames_requested: Cell<u32>,
    pub on_pause: RefCell<Option<Box<dyn FnMut(u32)>>>,
}

impl Host for TestHost {
    fn now_ms(&self) -> f64 {
        16.0 * self.frames_requested.get() as f64
    }

    fn pause(&self, _quantum: Duration) -> LocalBoxFuture<'static, ()> {
        let n = self.pauses.get() + 1;
        self.pauses.set(n);
        if let Some(hook) = self.on_pause.borrow_mut().as_mut() {
            hook(n);
        }
        futures::future::ready(()).boxed_local()
    }

    fn request_frame(&self) {
        self.frames_requested.set(self.frames_requested.get() + 1);
    }
}
