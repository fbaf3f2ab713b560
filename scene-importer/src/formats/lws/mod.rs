//! LightWave scene (LWS) and motion (MOT) reader
//!
//! A scene file holds no geometry itself. It lists objects, lights and
//! cameras, each optionally parented to another item and driven by motion
//! envelopes. Objects name external model files which are loaded through a
//! [`BatchLoader`] and merged below their scene node.
//!
//! Every object becomes two nodes: a `Pivot:` node carrying the motion and a
//! child offset by the negated pivot point that holds the geometry and the
//! child items. The master graph is built left-handed, as LightWave stores
//! it, and converted while merging.

mod element;
mod envelope;

use crate::{
    animation::Animation,
    batch::{BatchLoader, LoadRequestId},
    builder::SceneBuilder,
    camera::Camera,
    combiner::{AttachmentInfo, MergeFlags, merge_scenes},
    error::{Error, Result},
    formats::{FormatReader, ImportContext, has_extension},
    hierarchy,
    importer::{PropertyStore, import_properties},
    importer_desc::{ImporterDesc, ImporterFlags},
    io::{base_name_of, normalize_path},
    light::{Light, LightType},
    metadata::common_metadata,
    node::NodeId,
    scanner::{Scanner, check_magic},
    scene::Scene,
    skeleton::attach_skeleton_mesh,
    types::{Color3D, Handedness, Matrix4x4, Vector3D},
};

use element::Element;
use envelope::{AnimResolver, Behaviour, Envelope, Interpolation, Key};

static DESC: ImporterDesc = ImporterDesc {
    name: "LightWave Scene Importer",
    author: "",
    maintainer: "",
    comments: "",
    flags: ImporterFlags::SUPPORT_TEXT_FLAVOUR,
    min_major: 0,
    max_major: 0,
    min_minor: 0,
    max_minor: 0,
    file_extensions: &["lws", "mot"],
};

pub(crate) const FORMAT: &str = "LWS";
const ROOT_NAME: &str = "<LWSRoot>";
const ANIMATION_NAME: &str = "LWSMasterAnim";
/// Item numbers use the low 28 bits, the item type the high 4
const ITEM_MASK: u32 = 0x0fff_ffff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Object = 1,
    Light = 2,
    Camera = 3,
}

impl ItemKind {
    fn label(self) -> &'static str {
        match self {
            ItemKind::Object => "object",
            ItemKind::Light => "light",
            ItemKind::Camera => "camera",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LightDesc {
    kind: u32,
    falloff: u32,
    color: Color3D,
    intensity: f32,
    /// Degrees
    cone_angle: f32,
    /// Degrees
    edge_angle: f32,
}

impl Default for LightDesc {
    fn default() -> Self {
        Self {
            kind: 0,
            falloff: 0,
            color: Color3D::ONE,
            intensity: 1.0,
            cone_angle: 45.0,
            edge_angle: 0.0,
        }
    }
}

/// One item of the scene, as declared
#[derive(Debug, Clone)]
struct ItemDesc {
    kind: ItemKind,
    number: u32,
    name: String,
    /// External model file of an object
    path: Option<String>,
    request: Option<LoadRequestId>,
    light: LightDesc,
    pivot: Vector3D,
    /// Packed id of the parent item, 0 for none
    parent: u32,
    envelopes: Vec<Envelope>,
}

impl ItemDesc {
    fn new(kind: ItemKind, number: u32) -> Self {
        Self {
            kind,
            number,
            name: String::new(),
            path: None,
            request: None,
            light: LightDesc::default(),
            pivot: Vector3D::ZERO,
            parent: 0,
            envelopes: Vec::new(),
        }
    }

    /// Type and number packed the way `ParentItem` refers to items
    fn id(&self) -> u32 {
        self.number | (self.kind as u32) << 28
    }

    /// File base name or declared name, followed by the packed id
    fn node_name(&self) -> String {
        let base = match &self.path {
            Some(path) if self.kind == ItemKind::Object => base_name_of(path),
            _ => self.name.as_str(),
        };
        format!("{base}_({:08X})", self.id())
    }
}

/// Everything read from a scene file
#[derive(Debug)]
struct LwsFile {
    items: Vec<ItemDesc>,
    first: i32,
    last: i32,
    fps: f64,
}

struct LwsParser<'c, 'a> {
    ctx: &'c mut ImportContext<'a>,
    batch: &'c mut BatchLoader<'a>,
    version: u32,
    motion_file: bool,
    first_override: Option<i32>,
    last_override: Option<i32>,
    file: LwsFile,
    /// Numbers for items declared without an explicit id
    counters: [u32; 3],
}

impl<'c, 'a> LwsParser<'c, 'a> {
    fn warn(&mut self, message: impl std::fmt::Display) {
        self.ctx.warn(format!("LWS: {message}"));
    }

    fn error(&mut self, message: impl std::fmt::Display) {
        self.ctx.error(format!("LWS: {message}"));
    }

    /// The most recently declared item, if it is of `kind` (or any kind)
    fn current(&mut self, keyword: &str, kind: Option<ItemKind>) -> Option<&mut ItemDesc> {
        let matches = match (self.file.items.last(), kind) {
            (Some(item), Some(kind)) => item.kind == kind,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            self.error(format_args!("unexpected keyword '{keyword}'"));
            return None;
        }
        self.file.items.last_mut()
    }

    fn next_number(&mut self, kind: ItemKind, scanner: &mut Scanner<'_>) -> u32 {
        if self.version >= 4 {
            if let Some(id) = scanner.parse_hex() {
                return id & ITEM_MASK;
            }
            self.warn(format_args!("{} without an item id", kind.label()));
        }
        let counter = &mut self.counters[kind as usize - 1];
        let number = *counter;
        *counter += 1;
        number
    }

    fn parse(&mut self, root: &Element) -> Result<()> {
        let elements = &root.children;
        let mut index = 2;
        while let Some(element) = elements.get(index) {
            index += 1;
            match element.keyword.as_str() {
                "LoadObjectLayer" => self.load_object(element, true)?,
                "LoadObject" => self.load_object(element, false)?,
                "AddNullObject" => {
                    let mut scanner = Scanner::new(element.value.as_bytes());
                    let number = self.next_number(ItemKind::Object, &mut scanner);
                    let mut item = ItemDesc::new(ItemKind::Object, number);
                    item.name = scanner.rest_of_line().into_owned();
                    self.file.items.push(item);
                }
                "Channel" => self.channel(element),
                "Envelope" => self.envelope(element),
                "ObjectMotion" | "LightMotion" | "CameraMotion" if self.version < 3 => {
                    index = self.old_motion(element, elements, index);
                }
                "Pre/PostBehavior" if self.version == 2 => self.pre_post_behaviour(element),
                "ParentItem" => {
                    let parent = Scanner::new(element.value.as_bytes()).parse_hex();
                    if let Some(item) = self.current("ParentItem", None) {
                        item.parent = parent.unwrap_or(0);
                    }
                }
                "ParentObject" => {
                    let parent = Scanner::new(element.value.as_bytes()).parse_unsigned_int();
                    if let Some(item) = self.current("ParentObject", None) {
                        item.parent = parent.unwrap_or(0) | (ItemKind::Object as u32) << 28;
                    }
                }
                "AddCamera" => {
                    let mut scanner = Scanner::new(element.value.as_bytes());
                    let number = self.next_number(ItemKind::Camera, &mut scanner);
                    self.file.items.push(ItemDesc::new(ItemKind::Camera, number));
                }
                "CameraName" => {
                    if let Some(item) = self.current("CameraName", Some(ItemKind::Camera)) {
                        item.name = element.value.clone();
                    }
                }
                "AddLight" => {
                    let mut scanner = Scanner::new(element.value.as_bytes());
                    let number = self.next_number(ItemKind::Light, &mut scanner);
                    self.file.items.push(ItemDesc::new(ItemKind::Light, number));
                }
                "LightName" => {
                    if let Some(item) = self.current("LightName", Some(ItemKind::Light)) {
                        item.name = element.value.clone();
                    }
                }
                "LightIntensity" | "LgtIntensity" => self.light_intensity(element),
                "LightType" | "LightFalloffType" | "LightConeAngle" | "LightEdgeAngle"
                | "LightColor" => self.light_property(element),
                "PivotPosition" | "PivotPoint" => {
                    let pivot = read_vector(&element.value);
                    if let Some(item) = self.current(&element.keyword, None) {
                        item.pivot = pivot;
                    }
                }
                "FirstFrame" => {
                    if self.first_override.is_none() {
                        self.file.first = read_int(&element.value) - 1;
                    }
                }
                "LastFrame" => {
                    if self.last_override.is_none() {
                        self.file.last = read_int(&element.value) - 1;
                    }
                }
                "FramesPerSecond" => {
                    let fps = read_float(&element.value);
                    if fps > 0.0 {
                        self.file.fps = f64::from(fps);
                    } else {
                        self.warn(format_args!("ignoring frame rate '{}'", element.value));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn load_object(&mut self, element: &Element, with_layer: bool) -> Result<()> {
        let mut scanner = Scanner::new(element.value.as_bytes());
        let layer = if with_layer {
            scanner.parse_unsigned_int()
        } else {
            None
        };
        let number = self.next_number(ItemKind::Object, &mut scanner);
        let path = scanner.rest_of_line().into_owned();
        if path.is_empty() {
            return Err(Error::parse(FORMAT, format!("{} without a file", element.keyword)));
        }

        let resolved = match self.ctx.find_referenced_file(&path) {
            Some(found) => found,
            None => {
                self.error(format_args!("unable to find referenced file '{path}'"));
                path.clone()
            }
        };
        let mut item = ItemDesc::new(ItemKind::Object, number);
        if normalize_path(&resolved) == normalize_path(self.ctx.current_file()) {
            // the item stays, only the attachment is lost
            self.error(format_args!("'{path}' references the scene itself, skipping it"));
        } else {
            let mut properties = PropertyStore::new();
            if let Some(layer) = layer {
                properties.set_int(
                    import_properties::ONE_LAYER_ONLY,
                    i32::try_from(layer).unwrap_or(i32::MAX),
                );
            }
            item.request = Some(self.batch.add_load_request(&resolved, properties));
        }
        item.path = Some(path);
        self.file.items.push(item);
        Ok(())
    }

    fn channel(&mut self, element: &Element) {
        if self.file.items.is_empty() && self.motion_file {
            // motion files animate a single item that is not declared
            self.error("motion file without an item, adding a dummy node");
            let mut item = ItemDesc::new(ItemKind::Object, 0);
            item.name = base_name_of(self.ctx.current_file()).to_owned();
            self.file.items.push(item);
        }
        let index = read_int(&element.value).max(0) as u32;
        if let Some(item) = self.current("Channel", None) {
            item.envelopes.push(Envelope::new(index));
        }
    }

    fn envelope(&mut self, element: &Element) {
        let fps = self.file.fps;
        let mut unknown_spans = Vec::new();
        let Some(envelope) = self
            .file
            .items
            .last_mut()
            .and_then(|item| item.envelopes.last_mut())
        else {
            self.error("unexpected keyword 'Envelope'");
            return;
        };

        // the first child is the key count
        for child in element.children.iter().skip(1) {
            let mut scanner = Scanner::new(child.value.as_bytes());
            match child.keyword.as_str() {
                "Key" => {
                    let value = scanner.parse_float().unwrap_or(0.0);
                    let seconds = scanner.parse_float().unwrap_or(0.0);
                    let span = scanner.parse_unsigned_int().unwrap_or(3);
                    let interpolation = Interpolation::from_span(span).unwrap_or_else(|| {
                        unknown_spans.push(span);
                        Interpolation::Linear
                    });
                    envelope.keys.push(Key {
                        time: f64::from(seconds) * fps,
                        value,
                        interpolation,
                    });
                }
                "Behaviors" => {
                    envelope.pre = Behaviour::from_code(scanner.parse_unsigned_int().unwrap_or(1));
                    envelope.post = Behaviour::from_code(scanner.parse_unsigned_int().unwrap_or(1));
                }
                _ => {}
            }
        }
        envelope.sort_keys();
        for span in unknown_spans {
            self.error(format_args!("unknown key span type {span}"));
        }
    }

    /// Envelopes written as sibling lines after a `*Motion` line: a channel
    /// count, then for each channel a key count and one line per key. Key
    /// times are in frames. Returns the index of the first unread element.
    fn old_motion(&mut self, element: &Element, elements: &[Element], mut index: usize) -> usize {
        let next = |index: &mut usize| {
            let found = elements.get(*index);
            *index += 1;
            found
        };
        let mut envelopes = Vec::new();
        let mut truncated = false;
        match next(&mut index) {
            Some(count) => {
                let channels = read_int(&count.keyword).max(0) as u32;
                'channels: for channel in 0..channels {
                    let mut envelope = Envelope::new(channel);
                    let Some(count) = next(&mut index) else {
                        truncated = true;
                        break;
                    };
                    for _ in 0..read_int(&count.keyword).max(0) {
                        let Some(line) = next(&mut index) else {
                            envelopes.push(envelope);
                            truncated = true;
                            break 'channels;
                        };
                        envelope.keys.push(Key {
                            time: f64::from(read_float(&line.value)),
                            value: read_float(&line.keyword),
                            interpolation: Interpolation::Linear,
                        });
                    }
                    envelope.sort_keys();
                    envelopes.push(envelope);
                }
            }
            None => truncated = true,
        }
        if truncated {
            self.error(format_args!("unexpected end of file in '{}'", element.keyword));
        }
        if let Some(item) = self.current(&element.keyword, None) {
            item.envelopes.extend(envelopes);
        }
        index.min(elements.len())
    }

    /// Two behaviour codes per envelope of the current item
    fn pre_post_behaviour(&mut self, element: &Element) {
        let mut scanner = Scanner::new(element.value.as_bytes());
        let Some(item) = self.current("Pre/PostBehavior", None) else {
            return;
        };
        for envelope in &mut item.envelopes {
            if let Some(pre) = scanner.parse_unsigned_int() {
                envelope.pre = Behaviour::from_code(pre);
            }
            if let Some(post) = scanner.parse_unsigned_int() {
                envelope.post = Behaviour::from_code(post);
            }
        }
    }

    fn light_intensity(&mut self, element: &Element) {
        let intensity = if element.value.starts_with("(envelope)") {
            self.error("light intensity envelopes are not supported");
            1.0
        } else {
            read_float(&element.value)
        };
        if let Some(item) = self.current(&element.keyword, Some(ItemKind::Light)) {
            item.light.intensity = intensity;
        }
    }

    fn light_property(&mut self, element: &Element) {
        let Some(item) = self.current(&element.keyword, Some(ItemKind::Light)) else {
            return;
        };
        let light = &mut item.light;
        match element.keyword.as_str() {
            "LightType" => light.kind = read_int(&element.value).max(0) as u32,
            "LightFalloffType" => light.falloff = read_int(&element.value).max(0) as u32,
            "LightConeAngle" => light.cone_angle = read_float(&element.value),
            "LightEdgeAngle" => light.edge_angle = read_float(&element.value),
            _ => light.color = read_vector(&element.value),
        }
    }
}

fn read_int(text: &str) -> i32 {
    Scanner::new(text.as_bytes()).parse_signed_int().unwrap_or(0)
}

fn read_float(text: &str) -> f32 {
    Scanner::new(text.as_bytes()).parse_float().unwrap_or(0.0)
}

fn read_vector(text: &str) -> Vector3D {
    let mut scanner = Scanner::new(text.as_bytes());
    let mut next = || scanner.parse_float().unwrap_or(0.0);
    let (x, y, z) = (next(), next(), next());
    Vector3D::new(x, y, z)
}

fn build_light(name: &str, desc: &LightDesc) -> Light {
    let light_type = match desc.kind {
        1 => LightType::Directional,
        2 => LightType::Spot,
        _ => LightType::Point,
    };
    let mut light = Light::new(name, light_type);
    light.color_diffuse = desc.color * desc.intensity;
    light.color_specular = light.color_diffuse;
    if light_type != LightType::Point {
        light.direction = Vector3D::Z;
    }
    if light_type == LightType::Spot {
        light.angle_inner_cone = desc.cone_angle.to_radians();
        light.angle_outer_cone = light.angle_inner_cone + desc.edge_angle.to_radians();
    }
    light.attenuation_constant = 0.0;
    light.attenuation_linear = 0.0;
    light.attenuation_quadratic = 0.0;
    match desc.falloff {
        1 => light.attenuation_constant = 1.0,
        2 => light.attenuation_linear = 1.0,
        _ => light.attenuation_quadratic = 1.0,
    }
    light
}

/// Reader for LightWave scene and motion files
#[derive(Debug, Clone, Default)]
pub struct LwsReader {
    first_frame: Option<i32>,
    last_frame: Option<i32>,
    favour_speed: bool,
    no_skeleton_mesh: bool,
}

impl FormatReader for LwsReader {
    fn info(&self) -> &'static ImporterDesc {
        &DESC
    }

    fn can_read(&self, path: &str, data: &[u8], deep_check: bool) -> bool {
        if !deep_check && has_extension(path, &DESC) {
            return true;
        }
        check_magic(data, b"LWSC") || check_magic(data, b"LWMO")
    }

    fn configure(&mut self, properties: &PropertyStore) {
        let frame = |name: &str| {
            properties
                .contains(name)
                .then(|| properties.get_int(name, 0))
        };
        self.first_frame = frame(import_properties::LWS_ANIM_START);
        self.last_frame = frame(import_properties::LWS_ANIM_END);
        self.favour_speed = properties.get_bool(import_properties::FAVOUR_SPEED, false);
        self.no_skeleton_mesh = properties.get_bool(import_properties::NO_SKELETON_MESHES, false);
    }

    fn read(&mut self, _path: &str, data: &[u8], ctx: &mut ImportContext<'_>) -> Result<Scene> {
        let root = element::parse(data)?;
        let motion_file = match root.children.first().map(|e| e.keyword.as_str()) {
            Some("LWSC") => false,
            Some("LWMO") => true,
            _ => {
                return Err(Error::parse(
                    FORMAT,
                    "file does not start with LWSC or LWMO",
                ));
            }
        };
        let version = root
            .children
            .get(1)
            .and_then(|e| Scanner::new(e.keyword.as_bytes()).parse_unsigned_int())
            .ok_or_else(|| Error::parse(FORMAT, "missing file format version"))?;
        log::debug!("LWS: file format version {version}");

        let mut batch = ctx.batch_loader();
        let mut parser = LwsParser {
            ctx: &mut *ctx,
            batch: &mut batch,
            version,
            motion_file,
            first_override: self.first_frame,
            last_override: self.last_frame,
            file: LwsFile {
                items: Vec::new(),
                first: self.first_frame.unwrap_or(0),
                last: self.last_frame.unwrap_or(60),
                fps: 25.0,
            },
            counters: [0; 3],
        };
        parser.parse(&root)?;
        let mut file = parser.file;
        if file.last < file.first {
            std::mem::swap(&mut file.first, &mut file.last);
        }

        let records: Vec<(u32, Option<u32>)> = file
            .items
            .iter()
            .map(|item| (item.id(), (item.parent != 0).then_some(item.parent)))
            .collect();
        let tree = hierarchy::resolve(&records, FORMAT)?;
        ctx.record(tree.issues.iter().cloned());

        batch.load_all();
        let (master, attachments) = self.build_master(&file, &tree, &mut batch, ctx)?;

        let flags = if self.favour_speed {
            MergeFlags::GEN_UNIQUE_NAMES
        } else {
            MergeFlags::GEN_UNIQUE_NAMES | MergeFlags::GEN_UNIQUE_MATNAMES
        };
        let mut scene = merge_scenes(master, attachments, flags)?;
        scene
            .metadata
            .insert(common_metadata::SOURCE_FORMAT_VERSION, version.to_string().into());
        if scene.is_incomplete() && !scene.animations.is_empty() && !self.no_skeleton_mesh {
            attach_skeleton_mesh(&mut scene);
        }
        Ok(scene)
    }
}

impl LwsReader {
    fn build_master(
        &self,
        file: &LwsFile,
        tree: &hierarchy::Hierarchy,
        batch: &mut BatchLoader<'_>,
        ctx: &mut ImportContext<'_>,
    ) -> Result<(Scene, Vec<AttachmentInfo>)> {
        let mut builder = SceneBuilder::new();
        builder.set_handedness(Handedness::Left);
        let root = builder.add_node(ROOT_NAME, Matrix4x4::IDENTITY, None);

        let (first, last) = (f64::from(file.first), f64::from(file.last));
        let mut attachments = Vec::new();
        let mut channels = Vec::new();
        // node that receives the children of each item
        let mut parents: Vec<NodeId> = vec![root; file.items.len()];

        for index in tree.preorder() {
            let item = &file.items[index];
            let parent = tree.parents[index].map_or(root, |p| parents[p]);
            let name = item.node_name();
            let resolver = AnimResolver::new(&item.envelopes);

            let animated_name = match item.kind {
                ItemKind::Object => format!("Pivot:{name}"),
                _ => name.clone(),
            };
            let node = builder.add_node(animated_name.as_str(), resolver.bind_pose(), Some(parent));
            parents[index] = node;

            match item.kind {
                ItemKind::Object => {
                    let attach = builder.add_node(
                        name.as_str(),
                        Matrix4x4::from_translation(-item.pivot),
                        Some(node),
                    );
                    parents[index] = attach;
                    if let Some(request) = item.request {
                        match batch.get_import(request) {
                            Ok(scene) => attachments.push(AttachmentInfo::new(scene, attach)),
                            Err(e) => ctx.error(format!(
                                "LWS: failed to read external file {}: {e}",
                                item.path.as_deref().unwrap_or_default()
                            )),
                        }
                    }
                }
                ItemKind::Light => builder.add_light(build_light(&name, &item.light)),
                ItemKind::Camera => {
                    let mut camera = Camera::new(name.as_str());
                    camera.look_at = Vector3D::Z;
                    builder.add_camera(camera);
                }
            }

            if first != last {
                if let Some(channel) = resolver.sample(&animated_name, first, last) {
                    channels.push(channel);
                }
            }
        }

        if !channels.is_empty() {
            let mut animation = Animation::new(ANIMATION_NAME, last - (first - 1.0), file.fps);
            animation.channels = channels;
            builder.add_animation(animation);
        }
        Ok((builder.build()?, attachments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{formats::ReaderRegistry, io::MemoryFileSystem};
    use approx::assert_relative_eq;

    fn import_with(fs: &MemoryFileSystem, properties: &PropertyStore, data: &str) -> Result<Scene> {
        ReaderRegistry::with_default_readers().import(
            "scenes/test.lws",
            data.as_bytes(),
            fs,
            properties,
            &[],
        )
    }

    fn import(data: &str) -> Result<Scene> {
        import_with(&MemoryFileSystem::new(), &PropertyStore::new(), data)
    }

    const CUBE_STL: &str = "solid cube
facet normal 0 0 1
outer loop
vertex 0 0 0
vertex 1 0 0
vertex 1 1 0
endloop
endfacet
endsolid cube
";

    const NULLS: &str = "LWSC
3

FirstFrame 1
LastFrame 11
FramesPerSecond 10

AddNullObject Base
ObjectMotion (unnamed)
NumChannels 9
Channel 0
{ Envelope
  2
  Key 1 0 0 0 0 0 0 0 0
  Key 3 1 0 0 0 0 0 0 0
  Behaviors 1 1
}
Channel 1
{ Envelope
  1
  Key 2 0 0 0 0 0 0 0 0
  Behaviors 1 1
}

AddNullObject Arm
ParentItem 10000000

AddLight
LightName Sun
LightColor 1 0.5 0.25
LightIntensity 2
LightType 2
LightConeAngle 30
LightEdgeAngle 15
LightFalloffType 2
ParentItem 10000001

AddCamera
CameraName Eye
";

    #[test]
    fn test_items_parents_and_names() {
        let scene = import(NULLS).expect("scene");
        let root = scene.root_node();
        assert_eq!(root.name(), ROOT_NAME);
        assert_eq!(root.num_children(), 2);

        let base = scene.find_node("Pivot:Base_(10000000)").expect("pivot");
        let attach = base.child(0).expect("attachment");
        assert_eq!(attach.name(), "Base_(10000000)");
        let arm = attach.find_node("Pivot:Arm_(10000001)").expect("arm below base");
        let sun = arm
            .child(0)
            .expect("arm attachment")
            .child(0)
            .expect("light node");
        assert_eq!(sun.name(), "Sun_(20000000)");
        assert_eq!(root.child(1).expect("camera").name(), "Eye_(30000000)");

        // no geometry at all
        assert!(scene.is_incomplete());
        assert_eq!(
            scene.metadata().get_string(common_metadata::SOURCE_FORMAT_VERSION),
            Some("3")
        );
        assert_eq!(scene.handedness(), Handedness::Right);
    }

    #[test]
    fn test_lights_and_cameras() {
        let scene = import(NULLS).expect("scene");
        let light = scene.light(0).expect("light");
        assert_eq!(light.name(), "Sun_(20000000)");
        assert_eq!(light.light_type(), LightType::Spot);
        assert!(light.color_diffuse().abs_diff_eq(Vector3D::new(2.0, 1.0, 0.5), 1e-6));
        assert_eq!(light.color_specular(), light.color_diffuse());
        assert_relative_eq!(light.angle_inner_cone(), 30f32.to_radians());
        assert_relative_eq!(light.angle_outer_cone(), 45f32.to_radians());
        assert_eq!(light.attenuation_linear(), 1.0);
        assert_eq!(light.attenuation_quadratic(), 0.0);

        assert_eq!(scene.num_cameras(), 1);
        assert_eq!(scene.camera(0).expect("camera").name(), "Eye_(30000000)");
    }

    #[test]
    fn test_bind_pose_and_animation() {
        let scene = import(NULLS).expect("scene");
        let base = scene.find_node("Pivot:Base_(10000000)").expect("pivot");
        let translation = base.transformation().w_axis.truncate();
        // left-handed z is mirrored on import, x and y stay
        assert!(translation.abs_diff_eq(Vector3D::new(1.0, 2.0, 0.0), 1e-6));

        let animation = scene.animation(0).expect("animation");
        assert_eq!(animation.name(), ANIMATION_NAME);
        assert_relative_eq!(animation.ticks_per_second(), 10.0);
        assert_relative_eq!(animation.duration(), 11.0);
        let channel = animation
            .find_channel("Pivot:Base_(10000000)")
            .expect("base channel");
        // keys at 0 s and 1 s become frames 0 and 10
        let times: Vec<f64> = channel.position_keys().iter().map(|k| k.time).collect();
        assert_eq!(times, [0.0, 10.0]);
        assert_relative_eq!(channel.position_keys()[1].value.x, 3.0);
        // items without envelopes are not animated
        assert!(animation.find_channel("Pivot:Arm_(10000001)").is_none());

        // skeleton mesh for a scene without geometry
        assert_eq!(scene.num_meshes(), 1);
        let mut properties = PropertyStore::new();
        properties.set_bool(import_properties::NO_SKELETON_MESHES, true);
        let bare = import_with(&MemoryFileSystem::new(), &properties, NULLS).expect("scene");
        assert_eq!(bare.num_meshes(), 0);
        assert!(bare.is_incomplete());
    }

    #[test]
    fn test_frame_range_from_properties() {
        let mut properties = PropertyStore::new();
        properties
            .set_int(import_properties::LWS_ANIM_START, 20)
            .set_int(import_properties::LWS_ANIM_END, 5);
        let scene = import_with(&MemoryFileSystem::new(), &properties, NULLS).expect("scene");
        let animation = scene.animation(0).expect("animation");
        // swapped to 5..20
        assert_relative_eq!(animation.duration(), 16.0);
        let channel = animation
            .find_channel("Pivot:Base_(10000000)")
            .expect("base channel");
        let times: Vec<f64> = channel.position_keys().iter().map(|k| k.time).collect();
        assert_eq!(times, [5.0]);
    }

    #[test]
    fn test_objects_are_merged_below_their_pivot() {
        let fs = MemoryFileSystem::new().with_file("scenes/objects/cube.stl", CUBE_STL);
        let data = "LWSC
3
LoadObjectLayer 1 objects/cube.stl
PivotPosition 0 0 1
LoadObjectLayer 1 objects/cube.stl
ParentItem 10000000
";
        let scene = import_with(&fs, &PropertyStore::new(), data).expect("scene");
        assert!(!scene.is_incomplete());
        assert_eq!(scene.num_meshes(), 2);

        let attach = scene.find_node("cube_(10000000)").expect("attachment");
        // pivot offset, mirrored into right-handed space
        let offset = attach.transformation().w_axis.truncate();
        assert!(offset.abs_diff_eq(Vector3D::new(0.0, 0.0, 1.0), 1e-6));
        let stl_root = attach.find_node("<STL_ASCII>").expect("merged root");
        assert_eq!(stl_root.parent().expect("parent").name(), "cube_(10000000)");
        assert_eq!(stl_root.child(0).expect("solid").name(), "cube");
        assert!(attach.find_node("Pivot:cube_(10000001)").is_some());
        // the second copy is renamed
        let copy = scene.find_node("<STL_ASCII>_1").expect("second copy");
        assert_eq!(copy.parent().expect("parent").name(), "cube_(10000001)");
        assert_eq!(copy.child(0).expect("solid").name(), "cube_1");
    }

    #[test]
    fn test_missing_object_is_recoverable() {
        let data = "LWSC
3
LoadObject objects/missing.lwo
";
        let scene = import(data).expect("scene");
        assert!(scene.is_incomplete());
        assert!(scene.find_node("Pivot:missing_(10000000)").is_some());
        assert!(
            scene
                .import_diagnostics()
                .iter()
                .any(|d| d.contains("missing.lwo"))
        );
    }

    #[test]
    fn test_rejects_bad_files() {
        assert!(import("LWXX\n3\n").is_err());
        assert!(import("LWSC\n").is_err());
        assert!(matches!(import("LWSC\n3\n"), Err(Error::NoRootNode { .. })));
        let err = import(&format!("LWSC\n3\n{}", "{ Nested\n".repeat(10_000))).unwrap_err();
        assert!(err.is_recursion_limit());
    }

    #[test]
    fn test_self_reference_only_loses_the_attachment() {
        let own = "LWSC\n3\nAddNullObject Keep\nLoadObject test.lws\n";
        let fs = MemoryFileSystem::new().with_file("scenes/test.lws", own);
        let scene = import_with(&fs, &PropertyStore::new(), own).expect("scene");
        assert!(scene.find_node("Pivot:Keep_(10000000)").is_some());
        let pivot = scene.find_node("Pivot:test_(10000001)").expect("item is kept");
        let slot = pivot.child(0).expect("attachment node");
        assert_eq!(slot.name(), "test_(10000001)");
        assert_eq!(slot.num_children(), 0);
        assert!(scene.is_incomplete());
        assert!(
            scene
                .import_diagnostics()
                .iter()
                .any(|d| d.contains("test.lws"))
        );
        assert_eq!(fs.open_count("scenes/test.lws"), 0);
    }

    #[test]
    fn test_old_motion_format() {
        let data = "LWSC
1
AddNullObject Old
ObjectMotion (unnamed)
2
1
4 0
2
1 0
5 10
";
        let scene = import(data).expect("scene");
        let node = scene.find_node("Pivot:Old_(10000000)").expect("node");
        let translation = node.transformation().w_axis.truncate();
        assert!(translation.abs_diff_eq(Vector3D::new(4.0, 1.0, 0.0), 1e-6));
        let animation = scene.animation(0).expect("animation");
        let channel = animation
            .find_channel("Pivot:Old_(10000000)")
            .expect("channel");
        let times: Vec<f64> = channel.position_keys().iter().map(|k| k.time).collect();
        assert_eq!(times, [0.0, 10.0]);
        assert_relative_eq!(channel.position_keys()[1].value.y, 5.0);
    }

    #[test]
    fn test_motion_file_gets_a_dummy_item() {
        let data = "LWMO
3
NumChannels 1
Channel 0
{ Envelope
  1
  Key 7 0 0 0 0 0 0 0 0
}
";
        let scene = import(data).expect("motion");
        let node = scene.find_node("Pivot:test_(10000000)").expect("dummy");
        assert_relative_eq!(node.transformation().w_axis.x, 7.0);
        assert!(
            scene
                .import_diagnostics()
                .iter()
                .any(|d| d.contains("dummy"))
        );
    }
}
