//! Built-in Trinity engine record layouts
//!
//! Covers the shared math structs, the resource dictionary tables used by
//! split archives, and the model family (TRMDL, TRMSH, TRMBF, TRMTR, TRSKL).
//! Field names and slot numbers match the serialized game data.

use super::error::DecodeResult;
use super::registry::{SchemaRegistry, SchemaRegistryBuilder};
use super::schema::{ElementType, FieldType, ScalarKind, SchemaId, TableField};

/// Identifiers of the built-in layouts
pub mod ids {
    use super::SchemaId;

    macro_rules! schema_ids {
        ($($konst:ident = $name:literal,)*) => {
            $(
                #[doc = concat!("`", $name, "` layout")]
                pub const $konst: SchemaId = SchemaId::new($name);
            )*
        };
    }

    schema_ids! {
        VECTOR2F = "Vector2f",
        VECTOR3F = "Vector3f",
        VECTOR4F = "Vector4f",
        VECTOR2I = "Vector2i",
        SPHERE = "Sphere",
        PACKED_QUATERNION = "PackedQuaternion",
        RGBA = "RGBA",
        TRANSFORM = "Transform",

        FILE_INFO = "FileInfo",
        PACK_INFO = "PackInfo",
        FILE_DESCRIPTOR = "FileDescriptor",
        CUSTOM_FILE_DESCRIPTOR = "CustomFileDescriptor",
        FILE_SYSTEM = "FileSystem",
        PACKED_FILE = "PackedFile",
        PACKED_ARCHIVE = "PackedArchive",

        TRBOUNDING_BOX = "TRBoundingBox",
        MODEL_MESH = "ModelMesh",
        MODEL_SKELETON = "ModelSkeleton",
        MODEL_LOD_ENTRY = "ModelLODEntry",
        MODEL_LOD = "ModelLOD",
        TRMDL = "TRMDL",

        TRVERTEX_ELEMENT = "TRVertexElement",
        TRVERTEX_ELEMENT_SIZE = "TRVertexElementSize",
        TRVERTEX_DECLARATION = "TRVertexDeclaration",
        TRBONE_WEIGHT = "TRBoneWeight",
        TRMESH_PART = "TRMeshPart",
        TRMESH = "TRMesh",
        TRMSH = "TRMSH",

        TRBUFFER = "TRBuffer",
        TRMORPH_TARGET = "TRMorphTarget",
        TRMODEL_BUFFER = "TRModelBuffer",
        TRMBF = "TRMBF",

        TRFLOAT_PARAMETER = "TRFloatParameter",
        TRVEC2F_PARAMETER = "TRVec2fParameter",
        TRVEC3F_PARAMETER = "TRVec3fParameter",
        TRVEC4F_PARAMETER = "TRVec4fParameter",
        TRSTRING_PARAMETER = "TRStringParameter",
        TRTEXTURE = "TRTexture",
        TRSAMPLER = "TRSampler",
        TRMATERIAL_SHADER = "TRMaterialShader",
        TRMATERIAL = "TRMaterial",
        TRMTR = "TRMTR",

        SRT = "SRT",
        MATRIX4X3F = "Matrix4x3f",
        TRTRANSFORM_NODE = "TRTransformNode",
        TRJOINT_INFO = "TRJointInfo",
        TRHELPER_BONE_INFO = "TRHelperBoneInfo",
        TRSKL = "TRSKL",
    }
}

#[allow(clippy::wildcard_imports)]
use ids::*;

const BOOL: FieldType = FieldType::Scalar(ScalarKind::Bool);
const I8: FieldType = FieldType::Scalar(ScalarKind::I8);
const U8: FieldType = FieldType::Scalar(ScalarKind::U8);
const U16: FieldType = FieldType::Scalar(ScalarKind::U16);
const I32: FieldType = FieldType::Scalar(ScalarKind::I32);
const U32: FieldType = FieldType::Scalar(ScalarKind::U32);
const U64: FieldType = FieldType::Scalar(ScalarKind::U64);
const F32: FieldType = FieldType::Scalar(ScalarKind::F32);
const STRING: FieldType = FieldType::String;
const BYTES: FieldType = FieldType::Bytes;
const U64_VEC: FieldType = FieldType::Vector(ElementType::Scalar(ScalarKind::U64));
const STRING_VEC: FieldType = FieldType::Vector(ElementType::String);

const fn inline(id: SchemaId) -> FieldType {
    FieldType::Struct(id)
}

const fn table(id: SchemaId) -> FieldType {
    FieldType::Table(id)
}

const fn tables(id: SchemaId) -> FieldType {
    FieldType::Vector(ElementType::Table(id))
}

/// `TableField` with slots numbered by position
fn sequential(fields: &[(&'static str, FieldType)]) -> Vec<TableField> {
    fields
        .iter()
        .zip(0u16..)
        .map(|(&(name, ty), slot)| TableField::new(name, slot, ty))
        .collect()
}

impl SchemaRegistry {
    /// Registry holding every built-in Trinity layout
    pub fn trinity() -> DecodeResult<Self> {
        let mut builder = Self::builder();
        register_math(&mut builder)?;
        register_resource_dictionary(&mut builder)?;
        register_model(&mut builder)?;
        register_mesh(&mut builder)?;
        register_material(&mut builder)?;
        register_skeleton(&mut builder)?;
        Ok(builder.build())
    }
}

/// Register the shared math structs
pub fn register_math(builder: &mut SchemaRegistryBuilder) -> DecodeResult<()> {
    builder
        .register_struct(VECTOR2F, 8, &[("X", F32), ("Y", F32)])?
        .register_struct(VECTOR3F, 12, &[("X", F32), ("Y", F32), ("Z", F32)])?
        .register_struct(VECTOR4F, 16, &[("W", F32), ("X", F32), ("Y", F32), ("Z", F32)])?
        .register_struct(VECTOR2I, 8, &[("X", I32), ("Y", I32)])?
        .register_struct(SPHERE, 16, &[("X", F32), ("Y", F32), ("Z", F32), ("Radius", F32)])?
        .register_struct(PACKED_QUATERNION, 6, &[("X", U16), ("Y", U16), ("Z", U16)])?
        .register_struct(RGBA, 16, &[("R", F32), ("G", F32), ("B", F32), ("A", F32)])?
        .register_struct(
            TRANSFORM,
            40,
            &[
                ("Scale", inline(VECTOR3F)),
                ("Rotate", inline(VECTOR4F)),
                ("Translate", inline(VECTOR3F)),
            ],
        )?;
    Ok(())
}

/// Register the resource dictionary tables used by split archives
pub fn register_resource_dictionary(builder: &mut SchemaRegistryBuilder) -> DecodeResult<()> {
    let descriptor = [
        ("FileHashes", U64_VEC),
        ("PackNames", STRING_VEC),
        ("FileInfo", tables(FILE_INFO)),
        ("PackInfo", tables(PACK_INFO)),
    ];
    let custom = [
        ("UnusedHashes", U64_VEC),
        ("UnusedFileInfo", tables(FILE_INFO)),
    ];

    builder
        .register_table(FILE_INFO, &sequential(&[("PackIndex", U64), ("UnusedTable", U32)]))?
        .register_table(PACK_INFO, &sequential(&[("FileSize", U64), ("FileCount", U64)]))?
        .register_table(FILE_DESCRIPTOR, &sequential(&descriptor))?
        .register_table(
            CUSTOM_FILE_DESCRIPTOR,
            &sequential(&[descriptor.as_slice(), custom.as_slice()].concat()),
        )?
        .register_table(FILE_SYSTEM, &sequential(&[("FileHashes", U64_VEC), ("FileOffsets", U64_VEC)]))?
        .register_table(
            PACKED_FILE,
            &sequential(&[
                ("Field_00", U32),
                ("EncryptionType", I8),
                ("Level", U8),
                ("FileSize", U64),
                ("FileBuffer", BYTES),
            ]),
        )?
        .register_table(
            PACKED_ARCHIVE,
            &sequential(&[("FileHashes", U64_VEC), ("FileEntry", tables(PACKED_FILE))]),
        )?;
    Ok(())
}

fn register_model(builder: &mut SchemaRegistryBuilder) -> DecodeResult<()> {
    builder
        .register_table(
            TRBOUNDING_BOX,
            &sequential(&[("MinBound", inline(VECTOR3F)), ("MaxBound", inline(VECTOR3F))]),
        )?
        .register_table(MODEL_MESH, &sequential(&[("PathName", STRING)]))?
        .register_table(MODEL_SKELETON, &sequential(&[("PathName", STRING)]))?
        .register_table(MODEL_LOD_ENTRY, &sequential(&[("Index", I32)]))?
        .register_table(
            MODEL_LOD,
            &sequential(&[("Entries", tables(MODEL_LOD_ENTRY)), ("Type", STRING)]),
        )?
        .register_table(
            TRMDL,
            &sequential(&[
                ("Field_00", I32),
                ("Meshes", tables(MODEL_MESH)),
                ("Skeleton", table(MODEL_SKELETON)),
                ("Materials", STRING_VEC),
                ("LODs", tables(MODEL_LOD)),
                ("Bounds", table(TRBOUNDING_BOX)),
                ("Field_06", inline(VECTOR4F)),
            ]),
        )?;
    Ok(())
}

fn register_mesh(builder: &mut SchemaRegistryBuilder) -> DecodeResult<()> {
    builder
        .register_table(
            TRVERTEX_ELEMENT,
            &sequential(&[
                ("vertexElementSizeIndex", I32),
                ("vertexUsage", I32),
                ("vertexElementLayer", I32),
                ("vertexFormat", I32),
                ("vertexElementOffset", I32),
            ]),
        )?
        .register_table(TRVERTEX_ELEMENT_SIZE, &sequential(&[("elementSize", I32)]))?
        .register_table(
            TRVERTEX_DECLARATION,
            &sequential(&[
                ("vertexElements", tables(TRVERTEX_ELEMENT)),
                ("vertexElementSizes", tables(TRVERTEX_ELEMENT_SIZE)),
            ]),
        )?
        .register_table(TRBONE_WEIGHT, &sequential(&[("RigIndex", I32), ("RigWeight", F32)]))?
        .register_table(
            TRMESH_PART,
            &sequential(&[
                ("indexCount", I32),
                ("indexOffset", I32),
                ("Field_02", I32),
                ("MaterialName", STRING),
                ("vertexDeclarationIndex", I32),
            ]),
        )?
        .register_table(
            TRMESH,
            &sequential(&[
                ("Name", STRING),
                ("boundingBox", table(TRBOUNDING_BOX)),
                ("IndexType", I32),
                ("vertexDeclaration", tables(TRVERTEX_DECLARATION)),
                ("meshParts", tables(TRMESH_PART)),
                ("Field_05", I32),
                ("Field_06", I32),
                ("Field_07", I32),
                ("Field_08", I32),
                ("clipSphere", inline(SPHERE)),
                ("boneWeight", tables(TRBONE_WEIGHT)),
                ("Field_11", STRING),
                ("Field_12", STRING),
            ]),
        )?
        .register_table(
            TRMSH,
            &sequential(&[
                ("Version", I32),
                ("Meshes", tables(TRMESH)),
                ("bufferFilePath", STRING),
            ]),
        )?
        .register_table(TRBUFFER, &sequential(&[("Bytes", BYTES)]))?
        .register_table(TRMORPH_TARGET, &sequential(&[("morphBuffers", tables(TRBUFFER))]))?
        .register_table(
            TRMODEL_BUFFER,
            &sequential(&[
                ("IndexBuffer", tables(TRBUFFER)),
                ("VertexBuffer", tables(TRBUFFER)),
                ("MorphTargets", tables(TRMORPH_TARGET)),
            ]),
        )?
        .register_table(
            TRMBF,
            &sequential(&[("Field_00", I32), ("TRMeshBuffers", tables(TRMODEL_BUFFER))]),
        )?;
    Ok(())
}

fn register_material(builder: &mut SchemaRegistryBuilder) -> DecodeResult<()> {
    let samplers: Vec<_> = [
        "State0", "State1", "State2", "State3", "State4", "State5", "State6", "State7", "State8",
        "RepeatU", "RepeatV", "RepeatW",
    ]
    .into_iter()
    .map(|name| (name, U32))
    .chain([("BorderColor", inline(RGBA))])
    .collect();

    builder
        .register_table(TRFLOAT_PARAMETER, &sequential(&[("Name", STRING), ("Value", F32)]))?
        .register_table(
            TRVEC2F_PARAMETER,
            &sequential(&[("Name", STRING), ("Value", inline(VECTOR2F))]),
        )?
        .register_table(
            TRVEC3F_PARAMETER,
            &sequential(&[("Name", STRING), ("Value", inline(VECTOR3F))]),
        )?
        .register_table(
            TRVEC4F_PARAMETER,
            &sequential(&[("Name", STRING), ("Value", inline(VECTOR4F))]),
        )?
        .register_table(TRSTRING_PARAMETER, &sequential(&[("Name", STRING), ("Value", STRING)]))?
        .register_table(
            TRTEXTURE,
            &sequential(&[("Name", STRING), ("File", STRING), ("Slot", U32)]),
        )?
        .register_table(TRSAMPLER, &sequential(&samplers))?
        .register_table(
            TRMATERIAL_SHADER,
            &sequential(&[("Name", STRING), ("Values", tables(TRSTRING_PARAMETER))]),
        )?
        .register_table(
            TRMATERIAL,
            &sequential(&[
                ("Name", STRING),
                ("Shader", tables(TRMATERIAL_SHADER)),
                ("Textures", tables(TRTEXTURE)),
                ("Samplers", tables(TRSAMPLER)),
                ("FloatParams", tables(TRFLOAT_PARAMETER)),
                ("Vec2fParams", tables(TRVEC2F_PARAMETER)),
                ("Vec3fParams", tables(TRVEC3F_PARAMETER)),
                ("Vec4fParams", tables(TRVEC4F_PARAMETER)),
            ]),
        )?
        .register_table(
            TRMTR,
            &sequential(&[("Field_00", I32), ("Materials", tables(TRMATERIAL))]),
        )?;
    Ok(())
}

fn register_skeleton(builder: &mut SchemaRegistryBuilder) -> DecodeResult<()> {
    builder
        .register_table(
            SRT,
            &sequential(&[
                ("Scale", inline(VECTOR3F)),
                ("Rotate", inline(VECTOR3F)),
                ("Translate", inline(VECTOR3F)),
            ]),
        )?
        .register_table(
            MATRIX4X3F,
            &sequential(&[
                ("AxisX", inline(VECTOR3F)),
                ("AxisY", inline(VECTOR3F)),
                ("AxisZ", inline(VECTOR3F)),
                ("AxisW", inline(VECTOR3F)),
            ]),
        )?
        .register_table(
            TRTRANSFORM_NODE,
            &sequential(&[
                ("Name", STRING),
                ("Transform", table(SRT)),
                ("ScalePivot", inline(VECTOR3F)),
                ("RotatePivot", inline(VECTOR3F)),
                ("ParentNodeIndex", I32),
                ("JointInfoIndex", I32),
                ("ParentNodeName", STRING),
                ("Priority", U32),
                ("PriorityPass", BOOL),
                ("IgnoreParentRotation", BOOL),
            ]),
        )?
        .register_table(
            TRJOINT_INFO,
            &sequential(&[
                ("SegmentScaleCompensate", BOOL),
                ("InfluenceSkinning", BOOL),
                ("InverseBindPoseMatrix", table(MATRIX4X3F)),
            ]),
        )?
        .register_table(
            TRHELPER_BONE_INFO,
            &sequential(&[
                ("Output", STRING),
                ("Target", STRING),
                ("Reference", STRING),
                ("Type", STRING),
                ("UpType", STRING),
                ("Weight", inline(VECTOR3F)),
                ("Adjust", inline(VECTOR4F)),
            ]),
        )?
        .register_table(
            TRSKL,
            &sequential(&[
                ("Version", U32),
                ("TransformNodes", tables(TRTRANSFORM_NODE)),
                ("JointInfos", tables(TRJOINT_INFO)),
                ("HelperBones", tables(TRHELPER_BONE_INFO)),
                ("SkinningPaletteOffset", I32),
                ("IsInteriorMap", BOOL),
            ]),
        )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::flatbuffer::value::Record;
    use crate::flatbuffer::{Decoder, Encoder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_registry_builds() {
        let registry = SchemaRegistry::trinity().unwrap();
        for id in [VECTOR3F, TRANSFORM, CUSTOM_FILE_DESCRIPTOR, PACKED_ARCHIVE, TRMDL, TRMSH, TRMBF, TRMTR, TRSKL] {
            assert!(registry.contains(id), "{id} missing");
        }
        assert_eq!(registry.struct_schema(TRANSFORM).unwrap().size, 40);
    }

    #[test]
    fn test_custom_descriptor_extends_descriptor() {
        let registry = SchemaRegistry::trinity().unwrap();
        let base = registry.table_schema(FILE_DESCRIPTOR).unwrap();
        let custom = registry.table_schema(CUSTOM_FILE_DESCRIPTOR).unwrap();
        assert_eq!(&custom.fields[..base.fields.len()], base.fields.as_slice());
        let last = custom.fields.last().unwrap();
        assert_eq!((last.name, last.slot), ("UnusedFileInfo", 5));
    }

    #[test]
    fn test_sampler_slots() {
        let registry = SchemaRegistry::trinity().unwrap();
        let sampler = registry.table_schema(TRSAMPLER).unwrap();
        let border = sampler.fields.iter().find(|f| f.name == "BorderColor").unwrap();
        assert_eq!(border.slot, 12);
    }

    #[test]
    fn test_model_roundtrip() {
        let registry = SchemaRegistry::trinity().unwrap();
        let vec3 = |x: f32| Record::new(VECTOR3F).with("X", x).with("Y", x).with("Z", x);
        let model = Record::new(TRMDL)
            .with("Field_00", 0i32)
            .with(
                "Meshes",
                vec![Record::new(MODEL_MESH).with("PathName", "pm0001_00_00.trmsh")],
            )
            .with("Skeleton", Record::new(MODEL_SKELETON).with("PathName", "pm0001_00_00.trskl"))
            .with("Materials", vec!["pm0001_00_00.trmtr".to_string()])
            .with(
                "Bounds",
                Record::new(TRBOUNDING_BOX)
                    .with("MinBound", vec3(-1.0))
                    .with("MaxBound", vec3(1.0)),
            );

        let bytes = Encoder::new(&registry).encode_root(&model).unwrap();
        let decoded = Decoder::new(&registry).decode_root(&bytes, TRMDL).unwrap();
        assert_eq!(decoded, model);
    }
}
