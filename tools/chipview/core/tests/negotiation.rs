mod common;

use chipview_core::backend::BackendKind;
use chipview_core::error::{RenderError, ShaderStage};
use chipview_core::error_presenter::{ErrorPresenter, TextSurface};
use chipview_core::frame::FrameDims;
use chipview_core::negotiator::Negotiator;
use common::{Fault, Ledger, ProbeScript, ScriptedProbe};
use futures::executor::block_on;

const DIMS: FrameDims = FrameDims { width: 64, height: 32 };

fn negotiator(ledger: &Ledger, modern: ProbeScript, legacy: ProbeScript) -> Negotiator {
    Negotiator::new(vec![
        ScriptedProbe::boxed(BackendKind::ModernGpu, ledger, modern),
        ScriptedProbe::boxed(BackendKind::LegacyRaster, ledger, legacy),
    ])
}

#[derive(Default)]
struct Canvas {
    text: Vec<String>,
}

impl TextSurface for Canvas {
    fn clear(&mut self) {
        self.text.clear();
    }

    fn fill_text(&mut self, text: &str, _x: f32, _y: f32, _size_px: f32) {
        self.text.push(text.to_owned());
    }
}

#[test]
fn modern_tier_is_preferred() {
    let ledger = Ledger::default();
    let mut negotiator =
        negotiator(&ledger, ProbeScript::Acquire(Fault::None), ProbeScript::Acquire(Fault::None));

    let kind = block_on(negotiator.negotiate(DIMS)).map(|handle| handle.kind()).ok();

    assert_eq!(kind, Some(BackendKind::ModernGpu));
    assert_eq!(negotiator.active_kind(), BackendKind::ModernGpu);
    assert_eq!(ledger.live(BackendKind::ModernGpu), 7);
    assert_eq!(ledger.created(BackendKind::LegacyRaster), 0);
}

#[test]
fn falls_back_to_legacy_when_modern_is_unavailable() {
    let ledger = Ledger::default();
    let mut negotiator = negotiator(
        &ledger,
        ProbeScript::Unavailable("navigator.gpu is undefined"),
        ProbeScript::Acquire(Fault::None),
    );

    let live = block_on(negotiator.negotiate(DIMS)).map(|handle| handle.live_resources()).ok();

    assert_eq!(live, Some(7));
    assert_eq!(negotiator.active_kind(), BackendKind::LegacyRaster);
    assert_eq!(ledger.live(BackendKind::LegacyRaster), 7);
    assert_eq!(ledger.created(BackendKind::ModernGpu), 0);
}

#[test]
fn a_tier_that_fails_to_link_leaves_nothing_behind() {
    let ledger = Ledger::default();
    let mut negotiator =
        negotiator(&ledger, ProbeScript::Acquire(Fault::Link), ProbeScript::Acquire(Fault::None));

    assert!(block_on(negotiator.negotiate(DIMS)).is_ok());

    assert_eq!(negotiator.active_kind(), BackendKind::LegacyRaster);
    assert_eq!(ledger.created(BackendKind::ModernGpu), 6);
    assert_eq!(ledger.live(BackendKind::ModernGpu), 0);
    assert_eq!(ledger.live(BackendKind::LegacyRaster), 7);
}

#[test]
fn a_tier_that_fails_midway_rolls_back_its_buffers() {
    let ledger = Ledger::default();
    let mut negotiator =
        negotiator(&ledger, ProbeScript::Acquire(Fault::Texture), ProbeScript::Acquire(Fault::None));

    assert!(block_on(negotiator.negotiate(DIMS)).is_ok());

    assert_eq!(ledger.created(BackendKind::ModernGpu), 4);
    assert_eq!(ledger.live(BackendKind::ModernGpu), 0);
}

#[test]
fn exhausting_every_tier_reports_each_cause() {
    let ledger = Ledger::default();
    let mut negotiator = negotiator(
        &ledger,
        ProbeScript::Unavailable("No device found"),
        ProbeScript::Acquire(Fault::VertexCompile),
    );

    let Err(err) = block_on(negotiator.negotiate(DIMS)) else {
        panic!("negotiation should fail with every tier broken");
    };

    assert_eq!(negotiator.active_kind(), BackendKind::None);
    assert_eq!(ledger.live(BackendKind::LegacyRaster), 0);

    let RenderError::NoBackendAvailable { attempts } = &err else {
        panic!("unexpected error {err}");
    };
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].kind, BackendKind::ModernGpu);
    assert!(matches!(
        attempts[1].cause,
        RenderError::ShaderCompileFailure { stage: ShaderStage::Vertex, .. }
    ));

    let chain = err.chain();
    assert!(chain.contains("No device found"));
    assert!(chain.contains("aVertCoord"));
}

#[test]
fn exhaustion_leaves_the_null_tier_selected() {
    let ledger = Ledger::default();
    let mut negotiator = negotiator(
        &ledger,
        ProbeScript::Unavailable("No device found"),
        ProbeScript::Acquire(Fault::Link),
    );

    assert!(matches!(
        block_on(negotiator.negotiate(DIMS)),
        Err(RenderError::NoBackendAvailable { .. })
    ));

    let Some(handle) = negotiator.active() else {
        panic!("the null tier should be selected");
    };
    assert_eq!(handle.kind(), BackendKind::None);
    assert!(handle.resources().is_none());
    assert_eq!(handle.live_resources(), 0);
    assert!(matches!(
        handle.submit_frame(&vec![0u8; DIMS.len()]),
        Err(RenderError::SessionLost { .. })
    ));
    assert_eq!(ledger.draws(), 0);
}

#[test]
fn a_shader_rejected_while_acquiring_falls_through() {
    let ledger = Ledger::default();
    let mut negotiator = negotiator(
        &ledger,
        ProbeScript::ShaderRejected(ShaderStage::Fragment, "unknown identifier 'uTint'"),
        ProbeScript::Acquire(Fault::None),
    );

    assert!(block_on(negotiator.negotiate(DIMS)).is_ok());
    assert_eq!(negotiator.active_kind(), BackendKind::LegacyRaster);
    assert_eq!(ledger.created(BackendKind::ModernGpu), 0);
}

#[test]
fn the_error_presenter_shows_the_failure_verbatim() {
    let ledger = Ledger::default();
    let mut negotiator = negotiator(
        &ledger,
        ProbeScript::Unavailable("No device found"),
        ProbeScript::Unavailable("No device found"),
    );

    let mut presenter = ErrorPresenter::new(Canvas::default());
    let outcome = block_on(negotiator.negotiate(DIMS)).map(|_| ());
    let expected = outcome.as_ref().err().map(ToString::to_string);

    assert!(presenter.guard(outcome).is_none());
    assert_eq!(negotiator.active_kind(), BackendKind::None);
    assert_eq!(presenter.surface().text.first(), expected.as_ref());

    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "No device found");
    presenter.present(&io);
    assert_eq!(presenter.surface().text, vec!["No device found".to_owned()]);
}

#[test]
fn renegotiating_does_not_accumulate_resources() {
    let ledger = Ledger::default();
    let (modern, modern_attempts) =
        ScriptedProbe::counted(BackendKind::ModernGpu, &ledger, ProbeScript::Acquire(Fault::None));
    let mut negotiator = Negotiator::new(vec![modern]);

    assert!(block_on(negotiator.negotiate(DIMS)).is_ok());
    let once = ledger.live(BackendKind::ModernGpu);

    assert!(block_on(negotiator.negotiate(DIMS)).is_ok());
    assert_eq!(ledger.live(BackendKind::ModernGpu), once);
    assert_eq!(ledger.created(BackendKind::ModernGpu), 2 * once);
    assert_eq!(modern_attempts.get(), 2);
    assert_eq!(ledger.backends_dropped(), 1);
}

#[test]
fn later_tiers_are_not_tried_once_one_succeeds() {
    let ledger = Ledger::default();
    let (legacy, legacy_attempts) =
        ScriptedProbe::counted(BackendKind::LegacyRaster, &ledger, ProbeScript::Acquire(Fault::None));
    let mut negotiator = Negotiator::new(vec![
        ScriptedProbe::boxed(BackendKind::ModernGpu, &ledger, ProbeScript::Acquire(Fault::None)),
        legacy,
    ]);

    assert!(block_on(negotiator.negotiate(DIMS)).is_ok());
    assert_eq!(legacy_attempts.get(), 0);
}

#[test]
fn taking_the_handle_and_dropping_it_releases_everything() {
    let ledger = Ledger::default();
    let mut negotiator =
        negotiator(&ledger, ProbeScript::Acquire(Fault::None), ProbeScript::Acquire(Fault::None));
    assert!(block_on(negotiator.negotiate(DIMS)).is_ok());

    let handle = negotiator.take();
    assert!(handle.is_some());
    assert_eq!(negotiator.active_kind(), BackendKind::None);

    drop(handle);
    assert_eq!(ledger.live(BackendKind::ModernGpu), 0);
}

#[test]
fn a_handle_refuses_frames_of_the_wrong_size() {
    let ledger = Ledger::default();
    let mut negotiator =
        negotiator(&ledger, ProbeScript::Acquire(Fault::None), ProbeScript::Acquire(Fault::None));
    let Ok(handle) = block_on(negotiator.negotiate(DIMS)) else {
        panic!("negotiation failed");
    };

    let short = vec![0u8; DIMS.len() - 1];
    assert!(matches!(
        handle.submit_frame(&short),
        Err(RenderError::FrameSize { expected: 2048, actual: 2047 })
    ));
    assert!(handle.submit_frame(&vec![1u8; DIMS.len()]).is_ok());
    assert_eq!(ledger.uploads().len(), 1);
    assert_eq!(ledger.draws(), 1);
}
