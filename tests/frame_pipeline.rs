use std::collections::HashSet;

use stratum::scene::FrameConstants;
use stratum::{
    Command, Drawable, Extent, HeadlessDevice, InputSource, KeyCode, NoInput, PassKind,
    FrameError, PipelineState, RenderError, Renderer, RendererConfig, Vec3,
};

/// Presses a scripted key set on the next frame only.
#[derive(Default)]
struct ScriptedInput {
    down: HashSet<KeyCode>,
    pressed: HashSet<KeyCode>,
}

impl ScriptedInput {
    fn press(&mut self, key: KeyCode) {
        self.pressed.insert(key);
    }
}

impl InputSource for ScriptedInput {
    fn read_mouse(&mut self) -> Vec3 {
        Vec3::ZERO
    }

    fn read_keys(&mut self) -> Option<&HashSet<KeyCode>> {
        Some(&self.down)
    }

    fn pressed_keys(&self) -> &HashSet<KeyCode> {
        &self.pressed
    }

    fn end_frame(&mut self) {
        self.pressed.clear();
    }
}

fn ready(device: HeadlessDevice) -> Renderer<HeadlessDevice, NoInput> {
    let mut renderer = Renderer::new(RendererConfig::default(), NoInput::default());
    renderer.init(device).unwrap();
    renderer
}

fn draws_in(device: &HeadlessDevice, pass: PassKind) -> Vec<stratum::BufferId> {
    device
        .commands()
        .iter()
        .filter_map(|command| match command {
            Command::Draw {
                pass: Some(p),
                constants,
                ..
            } if *p == pass => Some(*constants),
            _ => None,
        })
        .collect()
}

#[test]
fn first_frame_uploads_every_constant_buffer_once() {
    let mut renderer = ready(HeadlessDevice::new());
    renderer.render_at(0.0).unwrap();

    let device = renderer.device().unwrap();
    for object in renderer.scene().objects() {
        let constants = object.constants_buffer().unwrap();
        assert_eq!(device.write_count(constants), 1, "{}", object.name());
    }
    let sky = renderer.sky().constants_buffer().unwrap();
    assert_eq!(device.write_count(sky), 1);

    let frame_constants = renderer.frame_constants_buffer().unwrap();
    assert_eq!(device.write_count(frame_constants), 1);
    assert_eq!(device.frames_presented(), 1);
}

#[test]
fn layers_are_drawn_in_order() {
    let mut renderer = ready(HeadlessDevice::new());
    renderer.render_at(0.5).unwrap();

    let device = renderer.device().unwrap();
    assert_eq!(
        device.passes(),
        vec![
            PassKind::Opaque,
            PassKind::Sky,
            PassKind::Translucent,
            PassKind::Overlay
        ]
    );
    assert!(matches!(
        device.commands().first(),
        Some(Command::BeginFrame {
            clear: [0.4, 0.2, 0.4, 1.0]
        })
    ));
    assert!(matches!(device.commands().last(), Some(Command::Present)));

    let objects = renderer.scene().objects();
    let opaque: Vec<_> = objects[..4]
        .iter()
        .map(|o| o.constants_buffer().unwrap())
        .collect();
    assert_eq!(draws_in(device, PassKind::Opaque), opaque);
    assert_eq!(
        draws_in(device, PassKind::Sky),
        vec![renderer.sky().constants_buffer().unwrap()]
    );

    // red quad (5) first by default
    let red = objects[5].constants_buffer().unwrap();
    let blue = objects[4].constants_buffer().unwrap();
    assert_eq!(draws_in(device, PassKind::Translucent), vec![red, blue]);

    assert!(
        device
            .commands()
            .iter()
            .any(|c| matches!(c, Command::Overlay { quads } if *quads > 0))
    );
}

#[test]
fn t_key_swaps_the_translucent_order() {
    let mut renderer = Renderer::new(RendererConfig::default(), ScriptedInput::default());
    renderer.init(HeadlessDevice::new()).unwrap();

    renderer.input_mut().press(KeyCode::KeyT);
    renderer.render_at(0.0).unwrap();
    assert!(!renderer.ui().red_first);

    let objects = renderer.scene().objects();
    let red = objects[5].constants_buffer().unwrap();
    let blue = objects[4].constants_buffer().unwrap();
    let device = renderer.device().unwrap();
    assert_eq!(draws_in(device, PassKind::Translucent), vec![blue, red]);
}

#[test]
fn added_lights_reach_the_frame_constants() {
    let mut renderer = Renderer::new(RendererConfig::default(), ScriptedInput::default());
    renderer.init(HeadlessDevice::new()).unwrap();

    renderer.render_at(0.0).unwrap();
    renderer.input_mut().press(KeyCode::Equal);
    renderer.render_at(0.1).unwrap();
    renderer.input_mut().press(KeyCode::Equal);
    renderer.render_at(0.2).unwrap();

    assert_eq!(renderer.scene().lights().len(), 2);

    let device = renderer.device().unwrap();
    let bytes = device
        .buffer_contents(renderer.frame_constants_buffer().unwrap())
        .unwrap();
    let constants: FrameConstants = bytemuck::pod_read_unaligned(bytes);
    assert_eq!(constants.light_params, [2, 1, 0, 0]);
    assert_eq!(constants.lights[0].position, [2.0, 2.0, 0.0, 1.0]);
    assert_eq!(constants.ambient, [0.4, 0.4, 0.4, 1.0]);
}

#[test]
fn resize_clamps_and_refits_the_sky() {
    let mut renderer = ready(HeadlessDevice::new());
    let radius = renderer.sky().radius();

    renderer.resize(0, 0).unwrap();
    let clamped = renderer.sky().radius();
    renderer.resize(0, 0).unwrap();
    assert_eq!(renderer.sky().radius(), clamped);
    let device = renderer.device().unwrap();
    assert_eq!(
        device.resizes(),
        &[
            Extent {
                width: 8,
                height: 8
            },
            Extent {
                width: 8,
                height: 8
            }
        ]
    );
    // square target: the near-plane corner moves out
    assert!(clamped > radius);

    renderer.render_at(0.0).unwrap();
    assert_eq!(renderer.state(), PipelineState::Running);
}

#[test]
fn failed_scene_releases_everything_but_the_frame_resources() {
    let mut device = HeadlessDevice::new();
    device.fail_programs_after(2);

    let mut renderer = Renderer::new(RendererConfig::default(), NoInput::default());
    let err = renderer.init(device).unwrap_err();
    assert!(matches!(err, RenderError::Scene(_)));
    assert!(!err.is_transient());
    assert_eq!(renderer.state(), PipelineState::DeviceReady);

    let device = renderer.device().unwrap();
    assert_eq!(device.live_resources(), 1);

    // The scene can be rebuilt once the device recovers.
    renderer.device_mut().unwrap().fail_program_creation(false);
    renderer.build_scene().unwrap();
    assert_eq!(renderer.state(), PipelineState::SceneReady);
}

#[test]
fn texture_failure_aborts_init() {
    let mut device = HeadlessDevice::new();
    device.fail_texture_creation(true);

    let mut renderer = Renderer::new(RendererConfig::default(), NoInput::default());
    assert!(renderer.init(device).is_err());
    assert_eq!(renderer.device().unwrap().live_resources(), 1);
    assert!(renderer.render_at(0.0).is_err());
}

#[test]
fn transient_failures_skip_only_one_frame() {
    let mut renderer = ready(HeadlessDevice::new());
    renderer.render_at(0.0).unwrap();

    renderer.device_mut().unwrap().fail_writes(true);
    let err = renderer.render_at(0.1).unwrap_err();
    assert!(err.is_transient());
    assert_eq!(renderer.state(), PipelineState::Running);

    renderer.device_mut().unwrap().fail_writes(false);
    renderer.device_mut().unwrap().fail_begin_frame(true);
    assert!(renderer.render_at(0.2).unwrap_err().is_transient());

    renderer.device_mut().unwrap().fail_begin_frame(false);
    renderer.render_at(0.3).unwrap();
    assert_eq!(renderer.device().unwrap().frames_presented(), 2);
}

#[test]
fn failed_frame_constants_upload_skips_one_frame() {
    let mut renderer = ready(HeadlessDevice::new());
    renderer.render_at(0.0).unwrap();

    renderer.device_mut().unwrap().fail_frame_constant_writes(true);
    let err = renderer.render_at(0.1).unwrap_err();
    assert!(matches!(err, RenderError::Frame(FrameError::Constants(_))));
    assert!(err.is_transient());
    assert_eq!(renderer.state(), PipelineState::Running);
    assert_eq!(renderer.device().unwrap().frames_presented(), 1);

    renderer.device_mut().unwrap().fail_frame_constant_writes(false);
    renderer.render_at(0.2).unwrap();
    let device = renderer.device().unwrap();
    assert_eq!(device.frames_presented(), 2);
    assert_eq!(
        device.write_count(renderer.frame_constants_buffer().unwrap()),
        2
    );
}

#[test]
fn shutdown_releases_every_resource() {
    let mut device = HeadlessDevice::new();
    {
        let mut renderer = Renderer::new(RendererConfig::default(), NoInput::default());
        renderer.init(&mut device).unwrap();
        renderer.render_at(0.0).unwrap();
        renderer.shutdown().unwrap();
        assert_eq!(renderer.state(), PipelineState::Shutdown);
    }

    assert_eq!(device.live_resources(), 0);
    assert_eq!(device.released().len(), device.created().len());
}

#[test]
fn dropping_the_renderer_shuts_it_down() {
    let mut device = HeadlessDevice::new();
    {
        let mut renderer = Renderer::new(RendererConfig::default(), NoInput::default());
        renderer.init(&mut device).unwrap();
    }
    assert_eq!(device.live_resources(), 0);
}
