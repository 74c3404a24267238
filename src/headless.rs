//! A [`Device`] that records every call instead of rendering.
//!
//! Used by the test suite to drive the whole frame pipeline without a GPU. Buffers
//! keep their bytes so tests can read back what was uploaded, and each kind of
//! resource creation can be made to fail on demand.

use crate::device::{
    BufferDesc, BufferId, BufferUsage, Device, DrawCall, Extent, OverlayQuad, PassKind,
    ProgramDesc, ProgramId, Resource, TextureId,
};
use crate::error::DeviceError;
use crate::texture::TextureData;

/// One recorded frame command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BeginFrame { clear: [f32; 4] },
    SetPass(PassKind),
    Draw {
        pass: Option<PassKind>,
        program: ProgramId,
        constants: BufferId,
        index_count: u32,
        textures: usize,
    },
    Overlay { quads: usize },
    Present,
}

#[derive(Debug)]
struct BufferEntry {
    label: String,
    usage: BufferUsage,
    data: Vec<u8>,
    writable: bool,
    writes: usize,
}

#[derive(Debug)]
struct ProgramEntry {
    pass: PassKind,
}

#[derive(Debug)]
struct TextureEntry {
    layers: u32,
}

/// Counts down successful creations before an injected failure.
#[derive(Debug, Default, Clone, Copy)]
struct FailAfter(Option<usize>);

impl FailAfter {
    fn should_fail(&mut self) -> bool {
        match &mut self.0 {
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
            None => false,
        }
    }
}

/// Recording device for tests.
#[derive(Debug)]
pub struct HeadlessDevice {
    extent: Extent,
    buffers: Vec<Option<BufferEntry>>,
    programs: Vec<Option<ProgramEntry>>,
    textures: Vec<Option<TextureEntry>>,
    frame_constants: Option<BufferId>,
    commands: Vec<Command>,
    current_pass: Option<PassKind>,
    in_frame: bool,
    frames_presented: usize,
    resizes: Vec<Extent>,
    created: Vec<Resource>,
    released: Vec<Resource>,

    fail_frame_resources: bool,
    fail_buffers: FailAfter,
    fail_programs: FailAfter,
    fail_textures: FailAfter,
    fail_writes: bool,
    fail_constant_writes: bool,
    fail_begin: bool,
    fail_resize: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::with_extent(Extent {
            width: 1280,
            height: 720,
        })
    }
}

fn injected(what: &'static str) -> DeviceError {
    DeviceError::Creation {
        what,
        reason: "injected failure".to_string(),
    }
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extent(extent: Extent) -> Self {
        Self {
            extent,
            buffers: Vec::new(),
            programs: Vec::new(),
            textures: Vec::new(),
            frame_constants: None,
            commands: Vec::new(),
            current_pass: None,
            in_frame: false,
            frames_presented: 0,
            resizes: Vec::new(),
            created: Vec::new(),
            released: Vec::new(),
            fail_frame_resources: false,
            fail_buffers: FailAfter::default(),
            fail_programs: FailAfter::default(),
            fail_textures: FailAfter::default(),
            fail_writes: false,
            fail_constant_writes: false,
            fail_begin: false,
            fail_resize: false,
        }
    }

    // Failure injection

    pub fn fail_frame_resources(&mut self, fail: bool) {
        self.fail_frame_resources = fail;
    }

    /// Let `n` more buffer creations succeed, then fail every one after.
    pub fn fail_buffers_after(&mut self, n: usize) {
        self.fail_buffers = FailAfter(Some(n));
    }

    pub fn fail_program_creation(&mut self, fail: bool) {
        self.fail_programs = FailAfter(fail.then_some(0));
    }

    /// Let `n` more program creations succeed, then fail every one after.
    pub fn fail_programs_after(&mut self, n: usize) {
        self.fail_programs = FailAfter(Some(n));
    }

    pub fn fail_texture_creation(&mut self, fail: bool) {
        self.fail_textures = FailAfter(fail.then_some(0));
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Fail writes to the frame constants buffer only.
    pub fn fail_frame_constant_writes(&mut self, fail: bool) {
        self.fail_constant_writes = fail;
    }

    pub fn fail_begin_frame(&mut self, fail: bool) {
        self.fail_begin = fail;
    }

    pub fn fail_resize(&mut self, fail: bool) {
        self.fail_resize = fail;
    }

    // Inspection

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// The passes switched to, in order.
    pub fn passes(&self) -> Vec<PassKind> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::SetPass(pass) => Some(*pass),
                _ => None,
            })
            .collect()
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    pub fn resizes(&self) -> &[Extent] {
        &self.resizes
    }

    pub fn frame_constants(&self) -> Option<BufferId> {
        self.frame_constants
    }

    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.buffer(id).map(|b| b.data.as_slice())
    }

    /// Number of `write_buffer` calls that succeeded on `id`.
    pub fn write_count(&self, id: BufferId) -> usize {
        self.buffer(id).map_or(0, |b| b.writes)
    }

    /// The first live buffer created with `label` and `usage`.
    pub fn find_buffer(&self, label: &str, usage: BufferUsage) -> Option<BufferId> {
        self.buffers
            .iter()
            .position(|b| b.as_ref().is_some_and(|b| b.label == label && b.usage == usage))
            .map(BufferId)
    }

    pub fn buffer_usage(&self, id: BufferId) -> Option<BufferUsage> {
        self.buffer(id).map(|b| b.usage)
    }

    pub fn program_pass(&self, id: ProgramId) -> Option<PassKind> {
        self.programs.get(id.0)?.as_ref().map(|p| p.pass)
    }

    pub fn texture_layers(&self, id: TextureId) -> Option<u32> {
        self.textures.get(id.0)?.as_ref().map(|t| t.layers)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.iter().flatten().count()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.iter().flatten().count()
    }

    pub fn live_resources(&self) -> usize {
        self.live_buffers() + self.live_programs() + self.live_textures()
    }

    /// Every resource created, in creation order.
    pub fn created(&self) -> Vec<Resource> {
        self.created.clone()
    }

    /// Every resource released, in release order.
    pub fn released(&self) -> Vec<Resource> {
        self.released.clone()
    }

    fn buffer(&self, id: BufferId) -> Option<&BufferEntry> {
        self.buffers.get(id.0)?.as_ref()
    }

    fn insert_buffer(&mut self, entry: BufferEntry) -> BufferId {
        let id = BufferId(self.buffers.len());
        self.buffers.push(Some(entry));
        self.created.push(Resource::Buffer(id));
        id
    }
}

impl Device for HeadlessDevice {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn create_frame_resources(&mut self, constants_size: u64) -> Result<BufferId, DeviceError> {
        if self.fail_frame_resources {
            return Err(injected("depth buffer"));
        }
        let id = self.insert_buffer(BufferEntry {
            label: "frame constants".to_string(),
            usage: BufferUsage::Uniform,
            data: vec![0; constants_size as usize],
            writable: true,
            writes: 0,
        });
        self.frame_constants = Some(id);
        Ok(id)
    }

    fn release_frame_resources(&mut self) {
        if let Some(id) = self.frame_constants.take() {
            self.release_buffer(id);
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>) -> Result<BufferId, DeviceError> {
        if self.fail_buffers.should_fail() {
            return Err(injected("buffer"));
        }
        Ok(self.insert_buffer(BufferEntry {
            label: desc.label.to_string(),
            usage: desc.usage,
            data: desc.contents.to_vec(),
            writable: desc.writable,
            writes: 0,
        }))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        if self.fail_writes || (self.fail_constant_writes && self.frame_constants == Some(buffer)) {
            return Err(injected("buffer write"));
        }
        let entry = self
            .buffers
            .get_mut(buffer.0)
            .and_then(Option::as_mut)
            .ok_or(DeviceError::InvalidHandle("buffer"))?;
        if !entry.writable {
            return Err(DeviceError::ReadOnly(entry.label.clone()));
        }
        let size = entry.data.len() as u64;
        let len = data.len() as u64;
        if offset + len > size {
            return Err(DeviceError::OutOfRange { offset, len, size });
        }
        let start = offset as usize;
        entry.data[start..start + data.len()].copy_from_slice(data);
        entry.writes += 1;
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0) {
            if slot.take().is_some() {
                self.released.push(Resource::Buffer(buffer));
            }
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramId, DeviceError> {
        if self.fail_programs.should_fail() {
            return Err(injected("render pipeline"));
        }
        let id = ProgramId(self.programs.len());
        self.programs.push(Some(ProgramEntry { pass: desc.pass }));
        self.created.push(Resource::Program(id));
        Ok(id)
    }

    fn release_program(&mut self, program: ProgramId) {
        if let Some(slot) = self.programs.get_mut(program.0) {
            if slot.take().is_some() {
                self.released.push(Resource::Program(program));
            }
        }
    }

    fn create_texture(&mut self, _label: &str, data: &TextureData) -> Result<TextureId, DeviceError> {
        if self.fail_textures.should_fail() {
            return Err(injected("texture"));
        }
        let id = TextureId(self.textures.len());
        self.textures.push(Some(TextureEntry {
            layers: data.layers(),
        }));
        self.created.push(Resource::Texture(id));
        Ok(id)
    }

    fn release_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(texture.0) {
            if slot.take().is_some() {
                self.released.push(Resource::Texture(texture));
            }
        }
    }

    fn resize(&mut self, extent: Extent) -> Result<(), DeviceError> {
        if self.fail_resize {
            return Err(DeviceError::Surface("injected resize failure".to_string()));
        }
        self.extent = extent;
        self.resizes.push(extent);
        Ok(())
    }

    fn begin_frame(&mut self, clear: [f32; 4]) -> Result<(), DeviceError> {
        if self.fail_begin {
            return Err(DeviceError::Surface("injected surface loss".to_string()));
        }
        self.in_frame = true;
        self.current_pass = None;
        self.commands.push(Command::BeginFrame { clear });
        Ok(())
    }

    fn set_pass(&mut self, pass: PassKind) {
        self.current_pass = Some(pass);
        self.commands.push(Command::SetPass(pass));
    }

    fn draw_indexed(&mut self, call: &DrawCall<'_>) {
        self.commands.push(Command::Draw {
            pass: self.current_pass,
            program: call.program,
            constants: call.constants,
            index_count: call.index_count,
            textures: call.textures.len(),
        });
    }

    fn draw_overlay(&mut self, quads: &[OverlayQuad]) {
        self.commands.push(Command::Overlay { quads: quads.len() });
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        if !self.in_frame {
            return Err(DeviceError::NoFrame);
        }
        self.in_frame = false;
        self.frames_presented += 1;
        self.commands.push(Command::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(device: &mut HeadlessDevice, writable: bool) -> BufferId {
        device
            .create_buffer(&BufferDesc {
                label: "test",
                usage: BufferUsage::Uniform,
                contents: &[0; 16],
                writable,
            })
            .unwrap()
    }

    #[test]
    fn writes_are_bounds_checked() {
        let mut device = HeadlessDevice::new();
        let buffer = uniform(&mut device, true);
        assert!(device.write_buffer(buffer, 8, &[1; 8]).is_ok());
        assert!(matches!(
            device.write_buffer(buffer, 12, &[1; 8]),
            Err(DeviceError::OutOfRange { size: 16, .. })
        ));
        assert_eq!(device.write_count(buffer), 1);
        assert_eq!(&device.buffer_contents(buffer).unwrap()[8..], &[1; 8]);
    }

    #[test]
    fn read_only_buffers_reject_writes() {
        let mut device = HeadlessDevice::new();
        let buffer = uniform(&mut device, false);
        assert!(matches!(
            device.write_buffer(buffer, 0, &[1; 4]),
            Err(DeviceError::ReadOnly(_))
        ));
    }

    #[test]
    fn releasing_twice_or_unknown_handles_is_harmless() {
        let mut device = HeadlessDevice::new();
        let buffer = uniform(&mut device, true);
        device.release_buffer(buffer);
        device.release_buffer(buffer);
        device.release_buffer(BufferId(99));
        device.release_program(ProgramId(3));
        device.release_texture(TextureId(7));
        assert_eq!(device.released(), vec![Resource::Buffer(buffer)]);
        assert!(matches!(
            device.write_buffer(buffer, 0, &[0]),
            Err(DeviceError::InvalidHandle(_))
        ));
    }

    #[test]
    fn fail_after_counts_down() {
        let mut device = HeadlessDevice::new();
        device.fail_buffers_after(1);
        let desc = BufferDesc {
            label: "x",
            usage: BufferUsage::Vertex,
            contents: &[0; 4],
            writable: false,
        };
        assert!(device.create_buffer(&desc).is_ok());
        assert!(device.create_buffer(&desc).is_err());
        assert!(device.create_buffer(&desc).is_err());
    }

    #[test]
    fn present_without_begin_is_an_error() {
        let mut device = HeadlessDevice::new();
        assert!(matches!(device.present(), Err(DeviceError::NoFrame)));
    }
}
