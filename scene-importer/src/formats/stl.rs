//! Stereolithography (STL) reader
//!
//! Both flavours are handled. A binary file is an 80 byte header, a little
//! endian facet count and 50 bytes per facet; it is recognised purely by its
//! size. An ASCII file is one or more `solid ... endsolid` blocks.

use crate::{
    builder::SceneBuilder,
    error::{Error, Result},
    formats::{FormatReader, ImportContext, has_extension},
    importer::{PropertyStore, import_properties},
    importer_desc::{ImporterDesc, ImporterFlags},
    material::{DEFAULT_MATERIAL_NAME, Material, material_keys},
    mesh::{Face, Mesh},
    scanner::{Scanner, search_header_for_tokens},
    scene::{Scene, SceneFlags},
    types::{Color3D, Color4D, Matrix4x4, Vector3D},
};

static DESC: ImporterDesc = ImporterDesc {
    name: "Stereolithography (STL) Importer",
    author: "",
    maintainer: "",
    comments: "",
    flags: ImporterFlags::SUPPORT_TEXT_FLAVOUR.union(ImporterFlags::SUPPORT_BINARY_FLAVOUR),
    min_major: 0,
    max_major: 0,
    min_minor: 0,
    max_minor: 0,
    file_extensions: &["stl"],
};

const FORMAT: &str = "STL";
const HEADER_SIZE: usize = 80;
const BINARY_PREFIX: usize = HEADER_SIZE + 4;
const FACET_SIZE: usize = 50;
/// Bytes checked for 8-bit characters when telling ASCII from binary
const ASCII_PROBE: usize = 500;

/// Whether `data` has exactly the size a binary STL with its facet count has
pub fn is_binary_stl(data: &[u8]) -> bool {
    match facet_count(data) {
        Some(count) => BINARY_PREFIX as u64 + count as u64 * FACET_SIZE as u64 == data.len() as u64,
        None => false,
    }
}

/// Whether `data` looks like an ASCII STL: `solid` after optional
/// whitespace, and no 8-bit characters at the start of a large file.
///
/// Plenty of binary exporters start their header with `solid` as well, so
/// the keyword alone is not enough.
pub fn is_ascii_stl(data: &[u8]) -> bool {
    if is_binary_stl(data) {
        return false;
    }
    let mut scanner = Scanner::new(data);
    if !scanner.skip_spaces_and_line_ends() || scanner.remaining().len() <= 5 {
        return false;
    }
    let rest = scanner.remaining();
    if !rest.starts_with(b"solid") {
        return false;
    }
    data.len() < ASCII_PROBE || rest.iter().take(ASCII_PROBE).all(u8::is_ascii)
}

fn facet_count(data: &[u8]) -> Option<u32> {
    let bytes = data.get(HEADER_SIZE..BINARY_PREFIX)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_vec3(bytes: &[u8]) -> Vector3D {
    let f = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    Vector3D::new(f(0), f(4), f(8))
}

/// Facets of a binary file, three unshared vertices each
#[derive(Debug, Default)]
struct BinaryStl {
    positions: Vec<Vector3D>,
    normals: Vec<Vector3D>,
    colors: Option<Vec<Color4D>>,
    /// Colour from a Materialise `COLOR=` header
    header_color: Option<Color4D>,
}

/// One `solid` block of an ASCII file
#[derive(Debug, Default)]
struct Solid {
    name: Option<String>,
    positions: Vec<Vector3D>,
    normals: Vec<Vector3D>,
}

/// Reader for `.stl` files
#[derive(Debug, Default)]
pub struct StlReader {
    layer: Option<usize>,
}

impl FormatReader for StlReader {
    fn info(&self) -> &'static ImporterDesc {
        &DESC
    }

    fn can_read(&self, path: &str, data: &[u8], deep_check: bool) -> bool {
        if !deep_check {
            return has_extension(path, &DESC);
        }
        search_header_for_tokens(data, &["STL", "solid"], 200)
    }

    fn configure(&mut self, properties: &PropertyStore) {
        self.layer = usize::try_from(properties.get_int(import_properties::ONE_LAYER_ONLY, -1)).ok();
    }

    fn read(&mut self, _path: &str, data: &[u8], ctx: &mut ImportContext<'_>) -> Result<Scene> {
        if is_binary_stl(data) {
            build_binary(parse_binary(data)?)
        } else if is_ascii_stl(data) {
            let solids = parse_ascii(data, ctx)?;
            self.build_ascii(solids, ctx)
        } else {
            Err(Error::parse(FORMAT, "failed to determine STL storage representation"))
        }
    }
}

fn parse_binary(data: &[u8]) -> Result<BinaryStl> {
    let count = facet_count(data).ok_or(Error::Truncated {
        format: FORMAT,
        expected: BINARY_PREFIX,
        actual: data.len(),
    })? as usize;
    let expected = BINARY_PREFIX + count * FACET_SIZE;
    if data.len() < expected {
        return Err(Error::Truncated {
            format: FORMAT,
            expected,
            actual: data.len(),
        });
    }
    if count == 0 {
        return Err(Error::NoGeometry { format: FORMAT });
    }

    let header = &data[..HEADER_SIZE];
    let header_color = header.windows(6).position(|w| w == b"COLOR=").map(|at| {
        log::info!("STL: taking code path for Materialise files");
        let c = &data[at + 6..at + 10];
        Color4D::new(c[0] as f32, c[1] as f32, c[2] as f32, c[3] as f32) / 255.0
    });
    let default_color = header_color.unwrap_or(Color4D::splat(0.6));

    let mut stl = BinaryStl {
        positions: Vec::with_capacity(count * 3),
        normals: Vec::with_capacity(count * 3),
        colors: None,
        header_color,
    };
    for (i, facet) in data[BINARY_PREFIX..expected].chunks_exact(FACET_SIZE).enumerate() {
        let normal = read_vec3(&facet[0..12]);
        stl.normals.extend([normal; 3]);
        stl.positions.extend([
            read_vec3(&facet[12..24]),
            read_vec3(&facet[24..36]),
            read_vec3(&facet[36..48]),
        ]);

        let color = u16::from_le_bytes([facet[48], facet[49]]);
        if color & 0x8000 == 0 {
            continue;
        }
        let colors = stl.colors.get_or_insert_with(|| {
            log::info!("STL: mesh has vertex colors");
            vec![default_color; count * 3]
        });
        let channel = |shift: u16| ((color >> shift) & 0x1f) as f32 / 31.0;
        // Materialise files store the channels in reverse order
        let rgb = if header_color.is_some() {
            Color4D::new(channel(0), channel(5), channel(10), 1.0)
        } else {
            Color4D::new(channel(10), channel(5), channel(0), 1.0)
        };
        colors[i * 3..i * 3 + 3].fill(rgb);
    }
    Ok(stl)
}

fn triangles(vertex_count: usize) -> Vec<Face> {
    (0..vertex_count as u32)
        .step_by(3)
        .map(|base| Face::new(vec![base, base + 1, base + 2]))
        .collect()
}

fn default_material(diffuse: Color3D) -> Material {
    let mut material = Material::named(DEFAULT_MATERIAL_NAME);
    material.set_color(material_keys::COLOR_DIFFUSE, diffuse);
    material.set_color(material_keys::COLOR_SPECULAR, diffuse);
    material.set_color(material_keys::COLOR_AMBIENT, Color3D::splat(0.05));
    material
}

fn build_binary(stl: BinaryStl) -> Result<Scene> {
    let mut builder = SceneBuilder::new();
    let root = builder.add_node("<STL_BINARY>", Matrix4x4::IDENTITY, None);
    let node = builder.add_node("<STL_BINARY>_mesh", Matrix4x4::IDENTITY, Some(root));

    // a header colour only becomes the material colour without per-face colours
    let diffuse = match (&stl.colors, stl.header_color) {
        (None, Some(color)) => color.truncate(),
        _ => Color3D::ONE,
    };
    let material = builder.add_material(default_material(diffuse));

    let faces = triangles(stl.positions.len());
    let mut mesh = Mesh::new("", stl.positions, faces)
        .with_normals(stl.normals)
        .with_material_index(material);
    if let Some(colors) = stl.colors {
        mesh = mesh.with_vertex_colors(0, colors);
    }
    let mesh = builder.add_mesh(mesh);
    builder.attach_mesh(node, mesh);
    builder.build()
}

fn parse_vec3(scanner: &mut Scanner<'_>) -> Vector3D {
    let x = scanner.parse_float().unwrap_or_default();
    let y = scanner.parse_float().unwrap_or_default();
    let z = scanner.parse_float().unwrap_or_default();
    Vector3D::new(x, y, z)
}

fn parse_ascii(data: &[u8], ctx: &mut ImportContext<'_>) -> Result<Vec<Solid>> {
    let mut solids = Vec::new();
    let mut scanner = Scanner::new(data);

    while is_ascii_stl(scanner.remaining()) {
        scanner.skip_spaces_and_line_ends();
        scanner.advance("solid".len());
        let mut solid = Solid {
            name: scanner.next_token().map(|name| name.into_owned()),
            ..Solid::default()
        };

        let mut facet_vertices = 3;
        loop {
            if !scanner.skip_spaces_and_line_ends() {
                ctx.warn("unexpected end of file, 'endsolid' was expected");
                break;
            }
            if scanner.token_match("facet") {
                if facet_vertices != 3 {
                    ctx.warn("a new facet begins but the previous one is incomplete");
                }
                facet_vertices = 0;
                scanner.skip_spaces();
                let normal = if scanner.token_match("normal") {
                    parse_vec3(&mut scanner)
                } else {
                    ctx.warn(format!(
                        "line {}: a facet normal vector was expected but not found",
                        scanner.line_number()
                    ));
                    Vector3D::ZERO
                };
                solid.normals.extend([normal; 3]);
            } else if scanner.token_match("vertex") {
                if facet_vertices >= 3 {
                    ctx.error(format!(
                        "line {}: a facet with more than 3 vertices has been found",
                        scanner.line_number()
                    ));
                    scanner.skip_line();
                } else {
                    solid.positions.push(parse_vec3(&mut scanner));
                    facet_vertices += 1;
                }
            } else if scanner.token_match("endsolid") {
                scanner.skip_line();
                break;
            } else {
                // outer, loop, endloop, endfacet and anything unknown
                scanner.next_token();
            }
        }

        if solid.positions.len() % 3 != 0 {
            return Err(Error::parse(FORMAT, "invalid number of vertices"));
        }
        // a vertex without a facet line leaves the normals behind
        if solid.normals.len() != solid.positions.len() {
            return Err(Error::parse(
                FORMAT,
                "normal count does not match the vertex count",
            ));
        }
        solids.push(solid);
    }
    Ok(solids)
}

impl StlReader {
    fn build_ascii(&self, mut solids: Vec<Solid>, ctx: &mut ImportContext<'_>) -> Result<Scene> {
        if let Some(layer) = self.layer {
            if layer < solids.len() {
                solids = vec![solids.swap_remove(layer)];
            } else {
                ctx.warn(format!(
                    "solid {layer} was requested but the file has only {}, loading all of them",
                    solids.len()
                ));
            }
        }

        let mut builder = SceneBuilder::new();
        let root = builder.add_node("<STL_ASCII>", Matrix4x4::IDENTITY, None);
        let material = builder.add_material(default_material(Color3D::ONE));

        for (index, solid) in solids.into_iter().enumerate() {
            let name = solid.name.unwrap_or_else(|| format!("solid_{index}"));
            let node = builder.add_node(name.clone(), Matrix4x4::IDENTITY, Some(root));
            if solid.positions.is_empty() {
                ctx.warn(format!("solid '{name}' is empty or invalid, no data loaded"));
                continue;
            }
            let faces = triangles(solid.positions.len());
            let mesh = Mesh::new(name, solid.positions, faces)
                .with_normals(solid.normals)
                .with_material_index(material);
            let mesh = builder.add_mesh(mesh);
            builder.attach_mesh(node, mesh);
        }
        if builder.num_meshes() == 0 {
            builder.insert_flags(SceneFlags::INCOMPLETE);
        }
        builder.build()
    }
}
