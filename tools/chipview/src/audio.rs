use std::cell::RefCell;
use std::rc::Rc;

use chipview_core::render_loop::AudioCue;
use dasp_graph::{Buffer, Input};
use klingt::{AudioNode, CpalDevice, Handle, Klingt, ProcessContext};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{info, warn};

use crate::helpers::get_now_ms;

const BLOCK_LEN: usize = 64;
const BEEP_HZ: f32 = 440.0;
const BEEP_MS: u32 = 120;
const BEEP_VOLUME: f32 = 0.15;

/// A source node that plays whatever blocks are queued, silence otherwise.
pub struct BlockSource {
    blocks: Consumer<Buffer>,
}

#[derive(Clone, Copy, Debug)]
pub enum BlockSourceMessage {}

impl AudioNode for BlockSource {
    type Message = BlockSourceMessage;

    fn process(
        &mut self,
        _ctx: &ProcessContext,
        _messages: impl Iterator<Item = BlockSourceMessage>,
        _inputs: &[Input],
        outputs: &mut [Buffer],
    ) {
        if let Some(output) = outputs.first_mut() {
            match self.blocks.pop() {
                Ok(block) => *output = block,
                Err(_) => output.fill(0.0),
            }
        }
    }

    fn num_outputs(&self) -> usize {
        1
    }
}

/// Square-wave blocks for one beep at the given sample rate.
pub fn square_wave(sample_rate: u32) -> Vec<Buffer> {
    let samples = (sample_rate * BEEP_MS / 1000) as usize;
    let half_period = sample_rate as f32 / BEEP_HZ / 2.0;

    let mut blocks = Vec::with_capacity(samples.div_ceil(BLOCK_LEN));
    for start in (0..samples).step_by(BLOCK_LEN) {
        let mut block = Buffer::SILENT;
        for (i, sample) in block.iter_mut().enumerate() {
            let n = start + i;
            if n < samples {
                let high = (n as f32 / half_period) as u64 % 2 == 0;
                *sample = if high { BEEP_VOLUME } else { -BEEP_VOLUME };
            }
        }
        blocks.push(block);
    }
    blocks
}

struct Bridge {
    klingt: Klingt,
    sample_rate: u32,
    #[allow(dead_code)]
    source_handle: Handle<BlockSourceMessage>,
    producer: Producer<Buffer>,
    start_ms: f64,
    blocks_processed: u64,
}

impl Bridge {
    fn open() -> Option<Self> {
        let device = CpalDevice::default_output()?;
        let sample_rate = device.sample_rate();
        let mut klingt = Klingt::new(sample_rate).with_output(device.create_sink());

        let (producer, consumer) = RingBuffer::<Buffer>::new(1024);
        let source_handle = klingt.add(BlockSource { blocks: consumer });
        klingt.output(&source_handle);

        Some(Self { klingt, sample_rate, source_handle, producer, start_ms: get_now_ms(), blocks_processed: 0 })
    }

    fn process_audio(&mut self) {
        let elapsed = (get_now_ms() - self.start_ms) / 1000.0;
        // stay a few blocks ahead of real time
        let target_blocks = (elapsed * self.sample_rate as f64 / BLOCK_LEN as f64) as u64 + 4;

        while self.blocks_processed < target_blocks {
            self.klingt.process();
            self.blocks_processed += 1;
        }
    }
}

/// The beep cue, shared between the frame loop and the app that keeps the
/// audio graph running. Silent until `start` finds an output device.
#[derive(Clone, Default)]
pub struct BeepAudio {
    bridge: Rc<RefCell<Option<Bridge>>>,
}

impl BeepAudio {
    /// Open the default output. Browsers only allow this after a user gesture.
    pub fn start(&self) {
        if self.is_running() {
            return;
        }

        let mut bridge = self.bridge.borrow_mut();
        *bridge = Bridge::open();
        match bridge.as_ref() {
            Some(b) => info!("audio running at {} Hz", b.sample_rate),
            None => warn!("no audio device available, beeps are muted"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.bridge.borrow().is_some()
    }

    /// Call regularly from the main loop.
    pub fn process_audio(&self) {
        if let Some(bridge) = self.bridge.borrow_mut().as_mut() {
            bridge.process_audio();
        }
    }
}

impl AudioCue for BeepAudio {
    fn beep(&mut self) {
        let mut bridge = self.bridge.borrow_mut();
        let Some(bridge) = bridge.as_mut() else {
            return;
        };

        for block in square_wave(bridge.sample_rate) {
            if bridge.producer.push(block).is_err() {
                warn!("beep queue full; dropping the rest of the beep");
                break;
            }
        }
    }
}
