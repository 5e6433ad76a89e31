//! Demo run: plays a synthetic recording through the full pipeline and
//! logs what the rig and frame stages see.

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use anyhow::Result;

use kinect_rig::{
    BodyTrackingStage, CaptureSource, FrameExtractor, PlaybackConfig, RigMapper, SceneGraph,
    SkeletonEvent, TrackerConfig, TransformGraph,
    backend::mock::{MockPlayback, MockTracker, sample_skeleton},
    source::flow::attach_flow_control,
    types::PixelFormat,
};

fn main() -> Result<()> {
    env_logger::init();

    let playback = MockPlayback::recorded(
        Duration::from_secs(2),
        Duration::from_millis(33),
        PixelFormat::Bgra32,
    );
    let mut source = CaptureSource::open_playback(
        PlaybackConfig {
            path: "synthetic.mkv".into(),
            loop_playback: true,
        },
        Box::new(playback),
    )?;

    let graph = Arc::new(Mutex::new(TransformGraph::new()));
    let mut rig = {
        let mut graph = graph.lock().unwrap();
        RigMapper::new(&mut *graph, None)
    };

    let tracking = Arc::new(Mutex::new(BodyTrackingStage::new(
        TrackerConfig::default(),
        MockTracker::responding_with(Some(sample_skeleton())),
    )));
    tracking.lock().unwrap().start_runtime_probe();
    BodyTrackingStage::attach(tracking.clone(), &source);

    let extractor = FrameExtractor::new();
    extractor.attach(&source);

    let overlay = {
        let mut graph = graph.lock().unwrap();
        graph.create_node("video-overlay")
    };
    attach_flow_control(&source, graph.clone(), vec![overlay]);

    // Consumer tick at roughly 30 Hz for a couple of seconds.
    for tick in 0..60u32 {
        source.tick();

        if let Some(event) = tracking.lock().unwrap().poll_result() {
            let mut graph = graph.lock().unwrap();
            rig.apply(&mut *graph, &event);
            match event {
                SkeletonEvent::Tracked(_) => {
                    log::info!("tick {tick}: body tracked, rig visible")
                }
                SkeletonEvent::Empty => log::info!("tick {tick}: no body, rig hidden"),
            }
        }

        thread::sleep(Duration::from_millis(33));
    }

    let frame = extractor.next_frame()?;
    log::info!(
        "pulled {}x{} {:?} frame ({} bytes)",
        frame.width,
        frame.height,
        frame.format,
        frame.data.len()
    );
    let depth = extractor.next_depth_frame()?;
    log::info!("pulled {}x{} depth preview", depth.width, depth.height);

    source.close();
    log::info!("sensor closed, rig visible: {}", rig.is_visible());

    Ok(())
}
