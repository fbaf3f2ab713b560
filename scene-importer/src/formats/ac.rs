//! AC3D reader
//!
//! The format is line based. After the `AC3D<version>` magic come `MATERIAL`
//! lines and a tree of `OBJECT` blocks, each ending with a `kids n` line that
//! announces `n` child objects.

use crate::{
    builder::SceneBuilder,
    error::{Error, Result},
    formats::{FormatReader, ImportContext, MAX_DEPTH, has_extension},
    importer::{PropertyStore, import_properties},
    importer_desc::{ImporterDesc, ImporterFlags},
    light::{Light, LightType},
    material::{Material, ShadingMode, TextureType, UvTransform, material_keys},
    mesh::{Face, Mesh},
    metadata::{Metadata, MetadataEntry, common_metadata},
    node::NodeId,
    scanner::{Scanner, check_magic},
    scene::Scene,
    subdivision::{can_subdivide, catmull_clark},
    types::{Color3D, Matrix3x3, Matrix4x4, Vector2D, Vector3D, matrix3_from_rows},
};

static DESC: ImporterDesc = ImporterDesc {
    name: "AC3D Importer",
    author: "",
    maintainer: "",
    comments: "",
    flags: ImporterFlags::SUPPORT_TEXT_FLAVOUR,
    min_major: 0,
    max_major: 0,
    min_minor: 0,
    max_minor: 0,
    file_extensions: &["ac", "acc", "ac3d"],
};

const FORMAT: &str = "AC3D";
const MAGIC: &[u8] = b"AC3D";
const WORLD_NAME: &str = "<AC3DWorld>";

const SURFACE_TYPE_MASK: u32 = 0xf;
const DOUBLE_SIDED: u32 = 0x20;

#[derive(Debug, Clone, PartialEq)]
struct AcMaterial {
    name: String,
    rgb: Color3D,
    ambient: Color3D,
    emissive: Color3D,
    specular: Color3D,
    shininess: f32,
    transparency: f32,
}

impl Default for AcMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            rgb: Color3D::splat(0.6),
            ambient: Color3D::ZERO,
            emissive: Color3D::ZERO,
            specular: Color3D::ONE,
            shininess: 0.0,
            transparency: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ObjectKind {
    #[default]
    World,
    Group,
    Poly,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SurfaceType {
    Polygon,
    ClosedLine,
    OpenLine,
    TriangleStrip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SurfaceRef {
    vertex: u32,
    uv: Vector2D,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Surface {
    flags: u32,
    material: u32,
    refs: Vec<SurfaceRef>,
}

impl Surface {
    fn surface_type(&self) -> Option<SurfaceType> {
        match self.flags & SURFACE_TYPE_MASK {
            0 => Some(SurfaceType::Polygon),
            1 => Some(SurfaceType::ClosedLine),
            2 => Some(SurfaceType::OpenLine),
            4 => Some(SurfaceType::TriangleStrip),
            _ => None,
        }
    }

    fn is_double_sided(&self) -> bool {
        self.flags & DOUBLE_SIDED != 0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct AcObject {
    kind: ObjectKind,
    name: Option<String>,
    textures: Vec<String>,
    tex_repeat: Vector2D,
    tex_offset: Vector2D,
    rotation: Matrix3x3,
    translation: Vector3D,
    subdiv: u32,
    crease: Option<f32>,
    vertices: Vec<Vector3D>,
    surfaces: Vec<Surface>,
    num_refs: usize,
    children: Vec<AcObject>,
}

impl AcObject {
    fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            name: None,
            textures: Vec::new(),
            tex_repeat: Vector2D::ONE,
            tex_offset: Vector2D::ZERO,
            rotation: Matrix3x3::IDENTITY,
            translation: Vector3D::ZERO,
            subdiv: 0,
            crease: None,
            vertices: Vec::new(),
            surfaces: Vec::new(),
            num_refs: 0,
            children: Vec::new(),
        }
    }
}

/// An object whose children are still being read
struct OpenObject {
    object: AcObject,
    remaining_kids: u32,
    /// The `kids` line was found
    complete: bool,
}

#[derive(Debug, Default)]
struct AcFile {
    materials: Vec<AcMaterial>,
    objects: Vec<AcObject>,
    num_objects: usize,
}

struct AcParser<'s, 'c, 'a> {
    scanner: Scanner<'s>,
    ctx: &'c mut ImportContext<'a>,
    file: AcFile,
}

fn is_numeric_start(byte: Option<u8>) -> bool {
    matches!(byte, Some(b'0'..=b'9' | b'-' | b'+' | b'.'))
}

impl AcParser<'_, '_, '_> {
    fn warn(&mut self, message: &str) {
        let line = self.scanner.line_number();
        self.ctx.warn(format!("line {line}: {message}"));
    }

    fn error(&mut self, message: &str) {
        let line = self.scanner.line_number();
        self.ctx.error(format!("line {line}: {message}"));
    }

    fn parse_file(&mut self) -> Result<()> {
        // magic line
        self.scanner.skip_line();
        while self.scanner.skip_spaces_and_line_ends() {
            if self.scanner.token_match("MATERIAL") {
                let material = self.parse_material();
                self.file.materials.push(material);
                self.scanner.skip_line();
            } else if self.scanner.peek_token("OBJECT") {
                let object = self.parse_object_tree()?;
                self.file.objects.push(object);
            } else {
                self.scanner.skip_line();
            }
        }
        Ok(())
    }

    /// `N` floats, optionally preceded by the word `label`.
    ///
    /// A missing label is reported and leaves the values at zero.
    fn floats<const N: usize>(&mut self, label: &str) -> [f32; N] {
        let mut values = [0.0; N];
        self.scanner.skip_spaces();
        if !label.is_empty() && !self.scanner.token_match(label) {
            self.error(&format!("unexpected token, {label} was expected"));
            return values;
        }
        for value in &mut values {
            match self.scanner.parse_float() {
                Some(v) => *value = v,
                None => {
                    self.error("unexpected EOF/EOL while reading numbers");
                    break;
                }
            }
        }
        values
    }

    fn string(&mut self) -> String {
        match self.scanner.quoted_string() {
            Some(s) => s.into_owned(),
            None => {
                self.error("unexpected EOF/EOL in string");
                "ERROR".to_string()
            }
        }
    }

    // MATERIAL ("name") rgb r g b amb r g b emis r g b spec r g b shi n trans t
    fn parse_material(&mut self) -> AcMaterial {
        let mut material = AcMaterial::default();
        self.scanner.skip_spaces();
        if self.scanner.peek() == Some(b'"') {
            material.name = self.string();
        }
        if let Some(values) = self.labeled_color("rgb") {
            material.rgb = values;
        }
        if let Some(values) = self.labeled_color("amb") {
            material.ambient = values;
        }
        if let Some(values) = self.labeled_color("emis") {
            material.emissive = values;
        }
        if let Some(values) = self.labeled_color("spec") {
            material.specular = values;
        }
        let [shininess] = self.floats("shi");
        let [transparency] = self.floats("trans");
        material.shininess = shininess;
        material.transparency = transparency;
        material
    }

    fn labeled_color(&mut self, label: &str) -> Option<Color3D> {
        self.scanner.skip_spaces();
        if !self.scanner.peek_token(label) {
            self.error(&format!("unexpected token, {label} was expected"));
            return None;
        }
        Some(Color3D::from_array(self.floats(label)))
    }

    /// Read an object and all of its descendants.
    ///
    /// Children are read with an explicit stack of open objects, so nesting
    /// is bounded by [`MAX_DEPTH`] and never by the call stack.
    fn parse_object_tree(&mut self) -> Result<AcObject> {
        let mut stack = vec![self.parse_object()];
        loop {
            let Some(top) = stack.last_mut() else {
                return Err(Error::parse(FORMAT, "object stack is empty"));
            };
            if top.remaining_kids == 0 || !top.complete {
                let finished = stack.pop();
                let Some(finished) = finished else {
                    return Err(Error::parse(FORMAT, "object stack is empty"));
                };
                let Some(parent) = stack.last_mut() else {
                    return Ok(finished.object);
                };
                parent.object.children.push(finished.object);
                if !finished.complete {
                    parent.remaining_kids = 0;
                    self.warn("wrong number of kids");
                }
                continue;
            }

            top.remaining_kids -= 1;
            if !self.scanner.skip_spaces_and_line_ends() || !self.scanner.peek_token("OBJECT") {
                if let Some(top) = stack.last_mut() {
                    top.remaining_kids = 0;
                }
                self.warn("wrong number of kids");
                continue;
            }
            if stack.len() >= MAX_DEPTH {
                return Err(Error::RecursionLimit {
                    format: FORMAT,
                    limit: MAX_DEPTH,
                });
            }
            let child = self.parse_object();
            stack.push(child);
        }
    }

    /// Read one `OBJECT` block up to and including its `kids` line
    fn parse_object(&mut self) -> OpenObject {
        self.scanner.token_match("OBJECT");
        let kind = match self.scanner.next_token() {
            Some(t) if t.eq_ignore_ascii_case("light") => ObjectKind::Light,
            Some(t) if t.eq_ignore_ascii_case("group") => ObjectKind::Group,
            Some(t) if t.eq_ignore_ascii_case("world") => ObjectKind::World,
            _ => ObjectKind::Poly,
        };
        self.scanner.skip_line();
        self.file.num_objects += 1;

        let mut object = AcObject::new(kind);
        loop {
            if !self.scanner.skip_spaces_and_line_ends() {
                self.error("unexpected EOF, 'kids' line was expected");
                return OpenObject {
                    object,
                    remaining_kids: 0,
                    complete: false,
                };
            }
            if self.scanner.token_match("kids") {
                let kids = self.scanner.parse_unsigned_int().unwrap_or(0);
                self.scanner.skip_line();
                return OpenObject {
                    object,
                    remaining_kids: kids,
                    complete: true,
                };
            }

            if self.scanner.token_match("name") {
                object.name = Some(self.string());
            } else if self.scanner.token_match("texture") {
                let texture = self.string();
                object.textures.push(texture);
            } else if self.scanner.token_match("texrep") {
                object.tex_repeat = Vector2D::from_array(self.floats(""));
                if object.tex_repeat.x == 0.0 || object.tex_repeat.y == 0.0 {
                    object.tex_repeat = Vector2D::ONE;
                }
            } else if self.scanner.token_match("texoff") {
                object.tex_offset = Vector2D::from_array(self.floats(""));
            } else if self.scanner.token_match("rot") {
                object.rotation = matrix3_from_rows(self.floats(""));
            } else if self.scanner.token_match("loc") {
                object.translation = Vector3D::from_array(self.floats(""));
            } else if self.scanner.token_match("subdiv") {
                object.subdiv = self.scanner.parse_unsigned_int().unwrap_or(0);
            } else if self.scanner.token_match("crease") {
                object.crease = self.scanner.parse_float();
            } else if self.scanner.token_match("numvert") {
                let count = self.scanner.parse_unsigned_int().unwrap_or(0);
                self.scanner.skip_line();
                self.parse_vertices(&mut object, count);
                continue;
            } else if self.scanner.token_match("numsurf") {
                let count = self.scanner.parse_unsigned_int().unwrap_or(0);
                self.scanner.skip_line();
                self.parse_surfaces(&mut object, count);
                continue;
            }
            self.scanner.skip_line();
        }
    }

    fn parse_vertices(&mut self, object: &mut AcObject, count: u32) {
        for _ in 0..count {
            if !self.scanner.skip_spaces_and_line_ends() {
                self.error("unexpected EOF, not all vertices have been parsed yet");
                return;
            }
            if !is_numeric_start(self.scanner.peek()) {
                self.error("unexpected token, not all vertices have been parsed yet");
                return;
            }
            let position = Vector3D::from_array(self.floats(""));
            object.vertices.push(position);
            self.scanner.skip_line();
        }
    }

    fn parse_surfaces(&mut self, object: &mut AcObject, count: u32) {
        let mut quick3d = false;
        for _ in 0..count {
            if !self.scanner.skip_spaces_and_line_ends() {
                self.error("unexpected EOF, surface is incomplete");
                return;
            }
            let mut surface = Surface::default();
            if self.scanner.token_match("SURF") {
                surface.flags = self.scanner.parse_cpp_uint().unwrap_or(0);
                self.scanner.skip_line();
            } else {
                // Quick3D writes no SURF lines; surfaces are then told apart
                // by their refs blocks
                if !quick3d {
                    self.warn("SURF token was expected");
                    log::debug!("AC3D: continuing with the Quick3D workaround enabled");
                }
                quick3d = true;
            }

            while self.scanner.skip_spaces_and_line_ends() {
                if self.scanner.token_match("mat") {
                    surface.material = self.scanner.parse_unsigned_int().unwrap_or(0);
                    self.scanner.skip_line();
                } else if self.scanner.peek_token("refs") {
                    if quick3d && !surface.refs.is_empty() {
                        break;
                    }
                    self.scanner.token_match("refs");
                    let refs = self.scanner.parse_unsigned_int().unwrap_or(0);
                    self.scanner.skip_line();
                    self.parse_refs(&mut surface, refs);
                } else {
                    break;
                }
            }
            object.num_refs += surface.refs.len();
            object.surfaces.push(surface);
        }
    }

    fn parse_refs(&mut self, surface: &mut Surface, count: u32) {
        for _ in 0..count {
            if !self.scanner.skip_spaces_and_line_ends() || !is_numeric_start(self.scanner.peek()) {
                self.error("surface references are incomplete");
                return;
            }
            let vertex = self.scanner.parse_unsigned_int().unwrap_or(0);
            let uv = Vector2D::from_array(self.floats(""));
            surface.refs.push(SurfaceRef { vertex, uv });
            self.scanner.skip_line();
        }
    }
}

fn convert_material(object: &AcObject, source: &AcMaterial) -> Material {
    let mut material = Material::new();
    if !source.name.is_empty() {
        material.set_name(source.name.clone());
    }
    if let Some(texture) = object.textures.first() {
        material.add_texture(TextureType::Diffuse, 0, texture.clone());
        if object.tex_repeat != Vector2D::ONE || object.tex_offset != Vector2D::ZERO {
            material.set_uv_transform(
                TextureType::Diffuse,
                0,
                UvTransform {
                    translation: object.tex_offset.to_array(),
                    scaling: object.tex_repeat.to_array(),
                    rotation: 0.0,
                },
            );
        }
    }
    material.set_color(material_keys::COLOR_DIFFUSE, source.rgb);
    material.set_color(material_keys::COLOR_AMBIENT, source.ambient);
    material.set_color(material_keys::COLOR_EMISSIVE, source.emissive);
    material.set_color(material_keys::COLOR_SPECULAR, source.specular);
    if source.shininess != 0.0 {
        material.set_shading_model(ShadingMode::Phong);
        material.set_float(material_keys::SHININESS, source.shininess);
    } else {
        material.set_shading_model(ShadingMode::Gouraud);
    }
    material.set_float(material_keys::OPACITY, 1.0 - source.transparency);
    material
}

/// Geometry of one material of one object, with unshared vertices
#[derive(Default)]
struct MeshParts {
    positions: Vec<Vector3D>,
    uvs: Vec<Vector3D>,
    faces: Vec<Face>,
}

impl MeshParts {
    fn push_face(&mut self, object: &AcObject, refs: &[SurfaceRef]) {
        let base = self.positions.len() as u32;
        for r in refs {
            self.positions
                .push(object.vertices[r.vertex as usize] + object.translation);
            self.uvs.push(r.uv.extend(0.0));
        }
        self.faces
            .push(Face::new((base..base + refs.len() as u32).collect()));
    }

    fn push_surface(&mut self, object: &AcObject, surface: &Surface, kind: SurfaceType) {
        let refs = &surface.refs;
        match kind {
            SurfaceType::Polygon => {
                if refs.is_empty() {
                    return;
                }
                self.push_face(object, refs);
                if surface.is_double_sided() {
                    let back: Vec<SurfaceRef> = refs.iter().rev().copied().collect();
                    self.push_face(object, &back);
                }
            }
            SurfaceType::TriangleStrip => {
                for (i, window) in refs.windows(3).enumerate() {
                    let triangle = if i % 2 == 0 {
                        [window[0], window[1], window[2]]
                    } else {
                        [window[1], window[0], window[2]]
                    };
                    self.push_face(object, &triangle);
                    if surface.is_double_sided() {
                        self.push_face(object, &[triangle[2], triangle[1], triangle[0]]);
                    }
                }
            }
            SurfaceType::ClosedLine | SurfaceType::OpenLine => {
                if refs.len() < 2 {
                    return;
                }
                for pair in refs.windows(2) {
                    self.push_face(object, pair);
                }
                if kind == SurfaceType::ClosedLine {
                    self.push_face(object, &[refs[refs.len() - 1], refs[0]]);
                }
            }
        }
    }
}

/// Converts parsed objects into scene nodes, meshes and lights
struct Converter<'f> {
    materials: &'f [AcMaterial],
    eval_subdivision: bool,
}

impl Converter<'_> {
    fn node_name(&self, object: &AcObject, ctx: &mut ImportContext<'_>) -> String {
        if let Some(name) = &object.name {
            return name.clone();
        }
        let kind = match object.kind {
            ObjectKind::Group => "ACGroup",
            ObjectKind::Poly => "ACPoly",
            ObjectKind::Light => "ACLight",
            ObjectKind::World => "ACWorld",
        };
        format!("{kind}_{}", ctx.next_name_index(kind))
    }

    fn node_transform(object: &AcObject) -> Matrix4x4 {
        let mut transform = Matrix4x4::from_mat3(object.rotation);
        if object.kind == ObjectKind::Group || object.num_refs == 0 {
            transform.w_axis = object.translation.extend(1.0);
        }
        transform
    }

    /// Fix up bad references in place, then emit the meshes of `object`
    fn convert_meshes(
        &self,
        object: &mut AcObject,
        builder: &mut SceneBuilder,
        ctx: &mut ImportContext<'_>,
    ) -> Vec<u32> {
        if object.vertices.is_empty() {
            return Vec::new();
        }
        if object.surfaces.is_empty() || object.num_refs == 0 {
            log::info!("AC3D: no surfaces defined in object definition, a point list is returned");
            let material = builder.add_material(convert_material(object, &self.materials[0]));
            let faces = (0..object.vertices.len() as u32)
                .map(|i| Face::new(vec![i]))
                .collect();
            let mesh = Mesh::new("", object.vertices.clone(), faces).with_material_index(material);
            return vec![builder.add_mesh(mesh)];
        }

        let vertex_count = object.vertices.len() as u32;
        let mut per_material: Vec<Option<MeshParts>> = Vec::new();
        per_material.resize_with(self.materials.len(), || None);
        for surface in &mut object.surfaces {
            if surface.material as usize >= self.materials.len() {
                ctx.error("material index is out of range");
                surface.material = 0;
            }
            if surface.refs.is_empty() {
                ctx.warn("surface has zero vertex references");
            }
            for r in &mut surface.refs {
                if r.vertex >= vertex_count {
                    ctx.warn("invalid vertex reference");
                    r.vertex = 0;
                }
            }
        }

        for surface in &object.surfaces {
            let kind = surface.surface_type().unwrap_or_else(|| {
                ctx.warn(format!("the type flag of a surface is unknown: {:#x}", surface.flags));
                SurfaceType::Polygon
            });
            per_material[surface.material as usize]
                .get_or_insert_with(MeshParts::default)
                .push_surface(object, surface, kind);
        }

        let mut meshes = Vec::new();
        for (index, parts) in per_material.into_iter().enumerate() {
            let Some(parts) = parts.filter(|p| !p.faces.is_empty()) else {
                continue;
            };
            let material = builder.add_material(convert_material(object, &self.materials[index]));
            let mut mesh = Mesh::new("", parts.positions, parts.faces).with_material_index(material);
            if !object.textures.is_empty() {
                mesh = mesh.with_texture_coords(0, parts.uvs);
            }
            if object.subdiv > 0 {
                if self.eval_subdivision && can_subdivide(&mesh) {
                    log::info!("AC3D: evaluating subdivision surface of level {}", object.subdiv);
                    mesh = catmull_clark(&mesh, object.subdiv);
                } else {
                    log::info!("AC3D: leaving the subdivision surface untouched");
                }
            }
            meshes.push(builder.add_mesh(mesh));
        }
        meshes
    }

    fn convert(
        &self,
        root: AcObject,
        root_name: Option<&str>,
        builder: &mut SceneBuilder,
        ctx: &mut ImportContext<'_>,
    ) {
        let mut stack: Vec<(AcObject, Option<NodeId>)> = vec![(root, None)];
        while let Some((mut object, parent)) = stack.pop() {
            let meshes = self.convert_meshes(&mut object, builder, ctx);
            let name = match (parent, root_name) {
                (None, Some(name)) => name.to_string(),
                _ => self.node_name(&object, ctx),
            };
            let node = builder.add_node(name.clone(), Self::node_transform(&object), parent);
            for mesh in meshes {
                builder.attach_mesh(node, mesh);
            }
            if let Some(crease) = object.crease {
                let mut metadata = Metadata::default();
                metadata.insert("Crease", MetadataEntry::Float(crease));
                builder.set_node_metadata(node, metadata);
            }
            if object.kind == ObjectKind::Light {
                let mut light = Light::new(name, LightType::Point);
                light.color_diffuse = Color3D::ONE;
                light.color_specular = Color3D::ONE;
                light.attenuation_constant = 1.0;
                light.attenuation_linear = 0.0;
                builder.add_light(light);
            }
            let children = std::mem::take(&mut object.children);
            stack.extend(children.into_iter().rev().map(|child| (child, Some(node))));
        }
    }
}

/// Reader for AC3D files
#[derive(Debug)]
pub struct AcReader {
    eval_subdivision: bool,
}

impl Default for AcReader {
    fn default() -> Self {
        Self {
            eval_subdivision: true,
        }
    }
}

impl FormatReader for AcReader {
    fn info(&self) -> &'static ImporterDesc {
        &DESC
    }

    fn can_read(&self, path: &str, data: &[u8], deep_check: bool) -> bool {
        (deep_check || has_extension(path, &DESC)) && check_magic(data, MAGIC)
    }

    fn configure(&mut self, properties: &PropertyStore) {
        self.eval_subdivision = properties.get_bool(import_properties::AC_EVAL_SUBDIVISION, true);
    }

    fn read(&mut self, _path: &str, data: &[u8], ctx: &mut ImportContext<'_>) -> Result<Scene> {
        if !check_magic(data, MAGIC) {
            return Err(Error::parse(FORMAT, "no valid AC3D file, magic sequence not found"));
        }
        let version = data.get(MAGIC.len()).and_then(|&b| char::from(b).to_digit(16));
        if let Some(version) = version {
            log::info!("AC3D file format version: {version}");
        }

        let mut parser = AcParser {
            scanner: Scanner::new(data),
            ctx,
            file: AcFile::default(),
        };
        parser.parse_file()?;
        let AcFile {
            mut materials,
            mut objects,
            num_objects,
        } = parser.file;

        if objects.is_empty() || num_objects == 0 {
            return Err(Error::NoGeometry { format: FORMAT });
        }
        if materials.is_empty() {
            ctx.warn("no material has been found");
            materials.push(AcMaterial::default());
        }

        // several top-level objects share a dummy world
        let (root, root_name) = if objects.len() == 1 {
            (objects.remove(0), None)
        } else {
            let mut world = AcObject::new(ObjectKind::World);
            world.children = objects;
            (world, Some(WORLD_NAME))
        };

        let converter = Converter {
            materials: &materials,
            eval_subdivision: self.eval_subdivision,
        };
        let mut builder = SceneBuilder::new();
        if let Some(version) = version {
            builder
                .metadata_mut()
                .insert(common_metadata::SOURCE_FORMAT_VERSION, version.to_string().into());
        }
        converter.convert(root, root_name, &mut builder, ctx);
        if builder.num_meshes() == 0 {
            return Err(Error::NoGeometry { format: FORMAT });
        }
        builder.build()
    }
}
