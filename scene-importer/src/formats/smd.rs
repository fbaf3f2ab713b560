//! Valve SMD and VTA reader
//!
//! An SMD file is a sequence of sections, each opened by a keyword line and
//! closed by `end`:
//!
//! - `nodes`: `index "name" parent` bone declarations
//! - `skeleton`: `time n` frames holding `bone px py pz rx ry rz` poses
//! - `triangles`: a texture name line followed by three vertex lines
//! - `vertexanimation`: `time n` frames of vertex lines (VTA shape keys)
//!
//! A file with bones but no triangles is an animation of a skeleton that
//! lives elsewhere. Extra animations can be listed in `<name>_animation.txt`
//! next to the model.

use std::fmt::Display;

use crate::{
    animation::{Animation, DEFAULT_TICKS_PER_SECOND, NodeAnimation, QuaternionKey, VectorKey},
    builder::SceneBuilder,
    error::{Error, Result},
    formats::{FormatReader, ImportContext, has_extension},
    hierarchy,
    importer::{PropertyStore, import_properties},
    importer_desc::{ImporterDesc, ImporterFlags},
    io::{self, base_name_of, directory_of},
    material::{Material, TextureType},
    mesh::{Face, Mesh},
    node::NodeId,
    scanner::{Scanner, search_header_for_tokens},
    scene::{Scene, SceneFlags},
    skeleton::attach_skeleton_mesh,
    types::{Matrix4x4, Vector2D, Vector3D, quaternion_from_euler_xyz, rotation_from_euler_xyz},
    weights::{BoneLink, SkinnedVertex, resolve_weights},
};

static DESC: ImporterDesc = ImporterDesc {
    name: "Valve SMD Importer",
    author: "",
    maintainer: "",
    comments: "",
    flags: ImporterFlags::SUPPORT_TEXT_FLAVOUR,
    min_major: 0,
    max_major: 0,
    min_minor: 0,
    max_minor: 0,
    file_extensions: &["smd", "vta"],
};

const FORMAT: &str = "SMD";
const ROOT_NAME: &str = "<SMD_root>";

#[derive(Debug, Clone, Default)]
struct SmdVertex {
    parent: Option<u32>,
    position: Vector3D,
    normal: Vector3D,
    uv: Vector2D,
    links: Vec<BoneLink>,
}

#[derive(Debug, Clone, Default)]
struct Triangle {
    texture: u32,
    vertices: [SmdVertex; 3],
}

#[derive(Debug, Clone)]
struct BoneKey {
    time: f64,
    position: Vector3D,
    rotation: Vector3D,
}

impl BoneKey {
    fn matrix(&self) -> Matrix4x4 {
        Matrix4x4::from_translation(self.position) * rotation_from_euler_xyz(self.rotation)
    }
}

#[derive(Debug, Clone, Default)]
struct SmdBone {
    name: Option<String>,
    parent: Option<u32>,
    keys: Vec<BoneKey>,
}

/// Everything one SMD file declares
#[derive(Debug)]
struct SmdFile {
    textures: Vec<String>,
    triangles: Vec<Triangle>,
    bones: Vec<SmdBone>,
    has_uvs: bool,
}

impl SmdFile {
    fn bone_names(&self) -> Vec<String> {
        self.bones
            .iter()
            .enumerate()
            .map(|(i, bone)| bone.name.clone().unwrap_or_else(|| format!("<SMD_bone_{i}>")))
            .collect()
    }
}

struct SmdParser<'s, 'c, 'a> {
    scanner: Scanner<'s>,
    ctx: &'c mut ImportContext<'a>,
    keyframe: i32,
    // a bone needs a line of its own, so no index can reach this
    max_bones: usize,
    file: SmdFile,
}

fn parse(data: &[u8], ctx: &mut ImportContext<'_>, keyframe: i32) -> Result<SmdFile> {
    let mut parser = SmdParser {
        scanner: Scanner::new(data),
        ctx,
        keyframe,
        max_bones: data.iter().filter(|&&c| c == b'\n').count() + 1,
        file: SmdFile {
            textures: Vec::new(),
            triangles: Vec::new(),
            bones: Vec::new(),
            has_uvs: true,
        },
    };
    parser.parse_file()?;
    Ok(parser.file)
}

impl SmdParser<'_, '_, '_> {
    fn warn(&mut self, message: impl Display) {
        let line = self.scanner.line_number();
        self.ctx.warn(format!("line {line}: {message}"));
    }

    fn error(&mut self, message: impl Display) {
        let line = self.scanner.line_number();
        self.ctx.error(format!("line {line}: {message}"));
    }

    fn parse_file(&mut self) -> Result<()> {
        while self.scanner.skip_spaces_and_line_ends() {
            if self.scanner.token_match("version") {
                if self.scanner.parse_unsigned_int() != Some(1) {
                    self.warn("SMD version is not 1, this file format is not known, continuing");
                }
                self.scanner.skip_line();
            } else if self.scanner.token_match("nodes") {
                self.scanner.skip_line();
                self.parse_nodes()?;
            } else if self.scanner.token_match("triangles") {
                self.scanner.skip_line();
                self.parse_triangles();
            } else if self.scanner.token_match("vertexanimation") {
                self.scanner.skip_line();
                self.file.has_uvs = false;
                self.parse_vertex_animation();
            } else if self.scanner.token_match("skeleton") {
                self.scanner.skip_line();
                self.parse_skeleton();
            } else {
                self.scanner.skip_line();
            }
        }
        Ok(())
    }

    /// Skip to the next line with content. False at the end of the file or
    /// on the `end` of the section, which is consumed.
    fn next_section_line(&mut self, section: &str) -> bool {
        if !self.scanner.skip_spaces_and_line_ends() {
            self.warn(format!("unexpected end of file in the {section} section"));
            return false;
        }
        if self.scanner.token_match_case_insensitive("end") {
            self.scanner.skip_line();
            return false;
        }
        true
    }

    fn parse_nodes(&mut self) -> Result<()> {
        while self.next_section_line("nodes") {
            self.parse_node()?;
        }
        Ok(())
    }

    fn parse_node(&mut self) -> Result<()> {
        let Some(index) = self.scanner.parse_unsigned_int() else {
            return Err(Error::parse_at(
                FORMAT,
                self.scanner.line_number(),
                "unexpected EOF/EOL while parsing bone index",
            ));
        };
        let index = index as usize;
        if index >= self.max_bones {
            self.error(format!("bone index {index} is out of range"));
            self.scanner.skip_line();
            return Ok(());
        }

        let name = match self.scanner.quoted_string() {
            Some(name) => name.into_owned(),
            None => {
                self.warn("bone name is expected to be enclosed in double quotation marks");
                match self.scanner.next_token() {
                    Some(name) => name.into_owned(),
                    None => {
                        self.error("unexpected EOF/EOL while parsing bone name");
                        self.scanner.skip_line();
                        return Ok(());
                    }
                }
            }
        };
        let parent = match self.scanner.parse_signed_int() {
            Some(parent) => u32::try_from(parent).ok(),
            None => {
                self.error("unexpected EOF/EOL while parsing bone parent index, assuming -1");
                None
            }
        };

        if index >= self.file.bones.len() {
            self.file.bones.resize_with(index + 1, SmdBone::default);
        }
        let bone = &mut self.file.bones[index];
        bone.name = Some(name);
        bone.parent = parent;
        self.scanner.skip_line();
        Ok(())
    }

    fn texture_index(&mut self, name: &str) -> u32 {
        let found = self
            .file
            .textures
            .iter()
            .position(|texture| texture.eq_ignore_ascii_case(name));
        let index = found.unwrap_or_else(|| {
            self.file.textures.push(name.to_string());
            self.file.textures.len() - 1
        });
        index as u32
    }

    fn parse_triangles(&mut self) {
        while self.next_section_line("triangles") {
            let texture = self.scanner.rest_of_line();
            let texture = self.texture_index(&texture);
            self.scanner.skip_line();

            let mut triangle = Triangle {
                texture,
                ..Triangle::default()
            };
            let mut complete = true;
            for slot in &mut triangle.vertices {
                match self.parse_vertex(false) {
                    Some(vertex) => *slot = vertex,
                    None => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete {
                self.file.triangles.push(triangle);
            } else {
                self.warn("dropping an incomplete triangle");
            }
        }
    }

    fn floats<const N: usize>(&mut self, what: &str) -> Option<[f32; N]> {
        let mut values = [0.0; N];
        for (i, value) in values.iter_mut().enumerate() {
            match self.scanner.parse_float() {
                Some(v) => *value = v,
                None => {
                    self.error(format!("unexpected EOF/EOL while parsing {what} component {i}"));
                    return None;
                }
            }
        }
        Some(values)
    }

    /// Parse one vertex line. `None` means the section ended first.
    ///
    /// Lines of the vertex animation section have no texture coordinates and
    /// no bone links.
    fn parse_vertex(&mut self, vertex_animation: bool) -> Option<SmdVertex> {
        if !self.scanner.skip_spaces_and_line_ends() || self.scanner.peek_token("end") {
            return None;
        }
        let mut vertex = SmdVertex::default();
        let Some(parent) = self.scanner.parse_signed_int() else {
            self.error("unexpected EOF/EOL while parsing vertex parent");
            self.scanner.skip_line();
            return Some(vertex);
        };
        vertex.parent = u32::try_from(parent).ok();

        let Some([px, py, pz, nx, ny, nz]) = self.floats("vertex position and normal") else {
            self.scanner.skip_line();
            return Some(vertex);
        };
        vertex.position = Vector3D::new(px, py, pz);
        vertex.normal = Vector3D::new(nx, ny, nz);
        if vertex_animation {
            self.scanner.skip_line();
            return Some(vertex);
        }

        let Some([u, v]) = self.floats("vertex uv") else {
            self.scanner.skip_line();
            return Some(vertex);
        };
        vertex.uv = Vector2D::new(u, v);

        // bone links are optional
        if let Some(count) = self.scanner.parse_unsigned_int() {
            for _ in 0..count {
                let Some(bone) = self.scanner.parse_unsigned_int() else {
                    break;
                };
                let Some(weight) = self.scanner.parse_float() else {
                    break;
                };
                vertex.links.push(BoneLink::new(bone, weight));
            }
        }
        self.scanner.skip_line();
        Some(vertex)
    }

    fn parse_vertex_animation(&mut self) {
        let mut in_keyframe = false;
        let mut vertices = Vec::new();
        while self.next_section_line("vertexanimation") {
            if self.scanner.token_match("time") {
                in_keyframe = match self.scanner.parse_signed_int() {
                    Some(time) => time == self.keyframe,
                    None => {
                        self.error("unexpected EOF/EOL while parsing the frame time");
                        false
                    }
                };
                self.scanner.skip_line();
                continue;
            }
            match self.parse_vertex(true) {
                Some(vertex) if in_keyframe => vertices.push(vertex),
                Some(_) => {}
                None => break,
            }
        }

        if vertices.len() % 3 != 0 {
            log::debug!("SMD: dropping the incomplete last triangle of the vertex animation");
        }
        self.file
            .triangles
            .extend(vertices.chunks_exact(3).map(|corners| Triangle {
                texture: 0,
                vertices: [corners[0].clone(), corners[1].clone(), corners[2].clone()],
            }));
    }

    fn parse_skeleton(&mut self) {
        let mut time = 0;
        while self.next_section_line("skeleton") {
            if self.scanner.token_match("time") {
                match self.scanner.parse_signed_int() {
                    Some(t) => time = t,
                    None => self.error("unexpected EOF/EOL while parsing the frame time"),
                }
                self.scanner.skip_line();
            } else {
                self.parse_bone_pose(time);
            }
        }
    }

    fn parse_bone_pose(&mut self, time: i32) {
        let Some(index) = self.scanner.parse_unsigned_int() else {
            self.error("unexpected EOF/EOL while parsing bone index");
            self.scanner.skip_line();
            return;
        };
        let index = index as usize;
        if index >= self.file.bones.len() {
            self.error(format!("bone index {index} in skeleton section is out of range"));
            self.scanner.skip_line();
            return;
        }
        if let Some([px, py, pz, rx, ry, rz]) = self.floats("bone position and rotation") {
            self.file.bones[index].keys.push(BoneKey {
                time: f64::from(time),
                position: Vector3D::new(px, py, pz),
                rotation: Vector3D::new(rx, ry, rz),
            });
        }
        self.scanner.skip_line();
    }
}

/// Skeleton as committed to the builder
struct SkeletonNodes {
    /// Node meshes are attached to
    root: NodeId,
    names: Vec<String>,
    offsets: Vec<Matrix4x4>,
}

fn build_skeleton(
    builder: &mut SceneBuilder,
    file: &SmdFile,
    skeleton_only: bool,
    ctx: &mut ImportContext<'_>,
) -> Result<SkeletonNodes> {
    let names = file.bone_names();
    if file.bones.is_empty() {
        let root = builder.add_node(ROOT_NAME, Matrix4x4::IDENTITY, None);
        return Ok(SkeletonNodes {
            root,
            names,
            offsets: Vec::new(),
        });
    }

    let entries: Vec<(u32, Option<u32>)> = file
        .bones
        .iter()
        .enumerate()
        .map(|(i, bone)| (i as u32, bone.parent))
        .collect();
    let mut tree = hierarchy::resolve(&entries, FORMAT)?;
    ctx.record(std::mem::take(&mut tree.issues));

    // a lone top-level bone of a skeleton file becomes the root itself
    let dummy_root = if skeleton_only && tree.roots.len() == 1 {
        None
    } else {
        Some(builder.add_node(ROOT_NAME, Matrix4x4::IDENTITY, None))
    };

    let mut ids: Vec<Option<NodeId>> = vec![None; file.bones.len()];
    let mut globals = vec![Matrix4x4::IDENTITY; file.bones.len()];
    for i in tree.preorder() {
        let local = file.bones[i]
            .keys
            .first()
            .map(BoneKey::matrix)
            .unwrap_or(Matrix4x4::IDENTITY);
        let (parent, parent_global) = match tree.parents[i] {
            Some(p) => (ids[p], globals[p]),
            None => (dummy_root, Matrix4x4::IDENTITY),
        };
        globals[i] = parent_global * local;
        ids[i] = Some(builder.add_node(names[i].clone(), local, parent));
    }

    let root = dummy_root
        .or_else(|| tree.roots.first().and_then(|&r| ids[r]))
        .ok_or(Error::NoRootNode { format: FORMAT })?;
    Ok(SkeletonNodes {
        root,
        names,
        offsets: globals.iter().map(Matrix4x4::inverse).collect(),
    })
}

fn build_meshes(
    builder: &mut SceneBuilder,
    file: &SmdFile,
    skeleton: &SkeletonNodes,
    ctx: &mut ImportContext<'_>,
) {
    let texture_count = file.textures.len().max(1);
    let mut groups: Vec<Vec<&Triangle>> = vec![Vec::new(); texture_count];
    for triangle in &file.triangles {
        let slot = triangle.texture as usize;
        if slot >= texture_count {
            log::info!("SMD: material index overflow in face");
        }
        groups[slot.min(texture_count - 1)].push(triangle);
    }

    for (index, triangles) in groups.into_iter().enumerate() {
        let name = format!("Texture_{index}");
        let mut material = Material::named(name.clone());
        if let Some(texture) = file.textures.get(index).filter(|t| !t.is_empty()) {
            material.add_texture(TextureType::Diffuse, 0, texture.clone());
        }
        let material = builder.add_material(material);
        if triangles.is_empty() {
            continue;
        }

        let corners = triangles.iter().flat_map(|t| t.vertices.iter());
        let positions: Vec<Vector3D> = corners.clone().map(|v| v.position).collect();
        let normals: Vec<Vector3D> = corners.clone().map(|v| v.normal).collect();
        let faces = (0..positions.len() as u32)
            .step_by(3)
            .map(|base| Face::new(vec![base, base + 1, base + 2]))
            .collect();

        let mut mesh = Mesh::new(name, positions, faces)
            .with_normals(normals)
            .with_material_index(material);
        if file.has_uvs {
            mesh = mesh.with_texture_coords(0, corners.clone().map(|v| v.uv.extend(0.0)).collect());
        }
        if !file.bones.is_empty() {
            let skin: Vec<SkinnedVertex> = corners
                .map(|v| SkinnedVertex {
                    parent: v.parent,
                    links: v.links.clone(),
                })
                .collect();
            let mut resolved = resolve_weights(&skin, file.bones.len(), FORMAT);
            ctx.record(std::mem::take(&mut resolved.issues));
            mesh = mesh.with_bones(
                resolved.into_bones(|i| (skeleton.names[i].clone(), skeleton.offsets[i])),
            );
        }
        let mesh = builder.add_mesh(mesh);
        builder.attach_mesh(skeleton.root, mesh);
    }
}

/// Keyframes of every bone, shifted so the earliest frame is at time 0
fn build_animation(name: &str, file: &SmdFile) -> Option<Animation> {
    let times = file.bones.iter().flat_map(|b| &b.keys).map(|k| k.time);
    let first = times.clone().reduce(f64::min)?;
    let last = times.reduce(f64::max)?;

    let mut animation = Animation::new(name, last - first, DEFAULT_TICKS_PER_SECOND);
    let names = file.bone_names();
    for (bone, bone_name) in file.bones.iter().zip(names) {
        if bone.keys.is_empty() {
            continue;
        }
        let mut channel = NodeAnimation::new(bone_name);
        for key in &bone.keys {
            let time = key.time - first;
            channel.position_keys.push(VectorKey::new(time, key.position));
            channel
                .rotation_keys
                .push(QuaternionKey::new(time, quaternion_from_euler_xyz(key.rotation)));
        }
        animation.channels.push(channel);
    }
    Some(animation)
}

/// Reader for `.smd` and `.vta` files
#[derive(Debug)]
pub struct SmdReader {
    keyframe: i32,
    load_animation_list: bool,
    no_skeleton_mesh: bool,
}

impl Default for SmdReader {
    fn default() -> Self {
        Self {
            keyframe: 0,
            load_animation_list: true,
            no_skeleton_mesh: false,
        }
    }
}

impl FormatReader for SmdReader {
    fn info(&self) -> &'static ImporterDesc {
        &DESC
    }

    fn can_read(&self, path: &str, data: &[u8], deep_check: bool) -> bool {
        if !deep_check {
            return has_extension(path, &DESC);
        }
        let mut scanner = Scanner::new(data);
        scanner.skip_spaces_and_line_ends();
        scanner.peek_token("version") && search_header_for_tokens(data, &["nodes"], 200)
    }

    fn configure(&mut self, properties: &PropertyStore) {
        // the SMD specific keyframe wins over the global one
        self.keyframe = match properties.get_int(import_properties::SMD_KEYFRAME, -1) {
            -1 => properties.get_int(import_properties::GLOBAL_KEYFRAME, 0),
            frame => frame,
        };
        self.load_animation_list =
            properties.get_bool(import_properties::SMD_LOAD_ANIMATION_LIST, true);
        self.no_skeleton_mesh = properties.get_bool(import_properties::NO_SKELETON_MESHES, false);
    }

    fn read(&mut self, _path: &str, data: &[u8], ctx: &mut ImportContext<'_>) -> Result<Scene> {
        let file = parse(data, ctx, self.keyframe)?;
        if file.triangles.is_empty() && file.bones.is_empty() {
            return Err(Error::NoGeometry { format: FORMAT });
        }
        let skeleton_only = file.triangles.is_empty();
        if file.bones.iter().any(|b| b.name.is_none()) {
            ctx.warn("not all bones have been initialized");
        }

        let mut builder = SceneBuilder::new();
        let skeleton = build_skeleton(&mut builder, &file, skeleton_only, ctx)?;
        if skeleton_only {
            builder.insert_flags(SceneFlags::INCOMPLETE);
        } else {
            build_meshes(&mut builder, &file, &skeleton, ctx);
        }

        if let Some(animation) = build_animation("", &file) {
            builder.add_animation(animation);
        }
        if self.load_animation_list {
            for animation in self.load_animation_list(ctx) {
                builder.add_animation(animation);
            }
        }

        let mut scene = builder.build()?;
        if skeleton_only && !self.no_skeleton_mesh {
            attach_skeleton_mesh(&mut scene);
        }
        Ok(scene)
    }
}

impl SmdReader {
    /// Animations listed in `<name>_animation.txt` beside the current file.
    ///
    /// Each line is `name path` or just `path`, relative to the list. A
    /// listed file that fails to load is reported and skipped.
    fn load_animation_list(&self, ctx: &mut ImportContext<'_>) -> Vec<Animation> {
        let current = ctx.current_file().to_string();
        let dir = directory_of(&current);
        let list_path = format!("{dir}{}_animation.txt", base_name_of(&current));
        if !ctx.io().exists(&list_path) {
            return Vec::new();
        }
        let list = match io::read_all(ctx.io(), &list_path) {
            Ok(list) => list,
            Err(e) => {
                ctx.error(format!("cannot read animation list {list_path}: {e}"));
                return Vec::new();
            }
        };

        let mut animations = Vec::new();
        for line in String::from_utf8_lossy(&list).lines() {
            let mut tokens = line.split_whitespace();
            let (name, path) = match (tokens.next(), tokens.next()) {
                (Some(name), Some(path)) => (name.to_string(), path),
                (Some(path), None) => (base_name_of(path).to_string(), path),
                _ => continue,
            };
            let path = format!("{dir}{path}");
            let file = io::read_all(ctx.io(), &path)
                .and_then(|data| parse(&data, ctx, self.keyframe));
            match file {
                Ok(file) => {
                    if let Some(animation) = build_animation(&name, &file) {
                        animations.push(animation);
                    }
                }
                Err(e) => ctx.error(format!("cannot load animation '{name}' from {path}: {e}")),
            }
        }
        animations
    }
}
