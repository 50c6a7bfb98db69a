//! Schema tables for job inputs and the recognized endpoint payloads.

use crate::job::Method;

use super::schema::{Constraint, DefaultValue, FieldKind, FieldSpec, Schema};

pub const ENDPOINT_DOWNLOAD: &str = "v1/download";
pub const ENDPOINT_SYNC: &str = "v1/sync";
pub const ENDPOINT_TXT2IMG: &str = "sdapi/v1/txt2img";
pub const ENDPOINT_IMG2IMG: &str = "sdapi/v1/img2img";
pub const ENDPOINT_INTERROGATE: &str = "sdapi/v1/interrogate";

pub const METHODS: &[&str] = &["GET", "POST"];
pub const INTERROGATE_MODELS: &[&str] = &["clip", "deepdanbooru"];

const STEPS: Constraint = Constraint::Range { min: 1.0, max: 150.0 };
const CFG_SCALE: Constraint = Constraint::Range { min: 1.0, max: 30.0 };
const DIMENSION: Constraint = Constraint::Range { min: 64.0, max: 2048.0 };
const BATCH: Constraint = Constraint::Range { min: 1.0, max: 100.0 };
const UNIT: Constraint = Constraint::Range { min: 0.0, max: 1.0 };

/// Top level of a validated-dispatch job input.
pub static INPUT_SCHEMA: Schema = Schema {
    name: "input",
    fields: &[
        FieldSpec::required("api", FieldKind::Object),
        FieldSpec::required("payload", FieldKind::Object),
    ],
};

/// Top level of a graph-submission job input.
pub static GRAPH_INPUT_SCHEMA: Schema = Schema {
    name: "input",
    fields: &[FieldSpec::required("payload", FieldKind::Object)],
};

pub static API_SCHEMA: Schema = Schema {
    name: "api",
    fields: &[
        FieldSpec::required("endpoint", FieldKind::String).with_constraint(Constraint::NonEmpty),
        FieldSpec::required("method", FieldKind::String).with_constraint(Constraint::OneOf(METHODS)),
    ],
};

pub static DOWNLOAD_SCHEMA: Schema = Schema {
    name: "payload",
    fields: &[
        FieldSpec::required("source_url", FieldKind::String).with_constraint(Constraint::HttpUrl),
        FieldSpec::required("download_path", FieldKind::String)
            .with_constraint(Constraint::NonEmpty),
    ],
};

pub static SYNC_SCHEMA: Schema = Schema {
    name: "payload",
    fields: &[
        FieldSpec::required("repo_id", FieldKind::String).with_constraint(Constraint::NonEmpty),
        FieldSpec::required("sync_path", FieldKind::String).with_constraint(Constraint::NonEmpty),
        FieldSpec::required("hf_token", FieldKind::String),
    ],
};

pub static TXT2IMG_SCHEMA: Schema = Schema {
    name: "payload",
    fields: &[
        FieldSpec::optional("prompt", FieldKind::String).with_default(DefaultValue::Str("")),
        FieldSpec::optional("negative_prompt", FieldKind::String)
            .with_default(DefaultValue::Str("")),
        FieldSpec::optional("styles", FieldKind::Array),
        FieldSpec::optional("seed", FieldKind::Integer).with_default(DefaultValue::Int(-1)),
        FieldSpec::optional("subseed", FieldKind::Integer).with_default(DefaultValue::Int(-1)),
        FieldSpec::optional("subseed_strength", FieldKind::Number)
            .with_default(DefaultValue::Float(0.0))
            .with_constraint(UNIT),
        FieldSpec::optional("sampler_name", FieldKind::String)
            .with_default(DefaultValue::Str("Euler a")),
        FieldSpec::optional("steps", FieldKind::Integer)
            .with_default(DefaultValue::Int(20))
            .with_constraint(STEPS),
        FieldSpec::optional("cfg_scale", FieldKind::Number)
            .with_default(DefaultValue::Float(7.0))
            .with_constraint(CFG_SCALE),
        FieldSpec::optional("width", FieldKind::Integer)
            .with_default(DefaultValue::Int(512))
            .with_constraint(DIMENSION),
        FieldSpec::optional("height", FieldKind::Integer)
            .with_default(DefaultValue::Int(512))
            .with_constraint(DIMENSION),
        FieldSpec::optional("batch_size", FieldKind::Integer)
            .with_default(DefaultValue::Int(1))
            .with_constraint(BATCH),
        FieldSpec::optional("n_iter", FieldKind::Integer)
            .with_default(DefaultValue::Int(1))
            .with_constraint(BATCH),
        FieldSpec::optional("restore_faces", FieldKind::Boolean)
            .with_default(DefaultValue::Bool(false)),
        FieldSpec::optional("tiling", FieldKind::Boolean).with_default(DefaultValue::Bool(false)),
        FieldSpec::optional("enable_hr", FieldKind::Boolean).with_default(DefaultValue::Bool(false)),
        FieldSpec::optional("hr_scale", FieldKind::Number).with_default(DefaultValue::Float(2.0)),
        FieldSpec::optional("hr_upscaler", FieldKind::String),
        FieldSpec::optional("denoising_strength", FieldKind::Number).with_constraint(UNIT),
        FieldSpec::optional("override_settings", FieldKind::Object)
            .with_default(DefaultValue::EmptyObject),
        FieldSpec::optional("alwayson_scripts", FieldKind::Object)
            .with_default(DefaultValue::EmptyObject),
        FieldSpec::optional("send_images", FieldKind::Boolean).with_default(DefaultValue::Bool(true)),
        FieldSpec::optional("save_images", FieldKind::Boolean)
            .with_default(DefaultValue::Bool(false)),
    ],
};

pub static IMG2IMG_SCHEMA: Schema = Schema {
    name: "payload",
    fields: &[
        FieldSpec::required("init_images", FieldKind::Array),
        FieldSpec::optional("mask", FieldKind::String),
        FieldSpec::optional("mask_blur", FieldKind::Integer).with_default(DefaultValue::Int(4)),
        FieldSpec::optional("inpainting_fill", FieldKind::Integer)
            .with_default(DefaultValue::Int(0)),
        FieldSpec::optional("resize_mode", FieldKind::Integer).with_default(DefaultValue::Int(0)),
        FieldSpec::optional("denoising_strength", FieldKind::Number)
            .with_default(DefaultValue::Float(0.75))
            .with_constraint(UNIT),
        FieldSpec::optional("prompt", FieldKind::String).with_default(DefaultValue::Str("")),
        FieldSpec::optional("negative_prompt", FieldKind::String)
            .with_default(DefaultValue::Str("")),
        FieldSpec::optional("styles", FieldKind::Array),
        FieldSpec::optional("seed", FieldKind::Integer).with_default(DefaultValue::Int(-1)),
        FieldSpec::optional("sampler_name", FieldKind::String)
            .with_default(DefaultValue::Str("Euler a")),
        FieldSpec::optional("steps", FieldKind::Integer)
            .with_default(DefaultValue::Int(20))
            .with_constraint(STEPS),
        FieldSpec::optional("cfg_scale", FieldKind::Number)
            .with_default(DefaultValue::Float(7.0))
            .with_constraint(CFG_SCALE),
        FieldSpec::optional("width", FieldKind::Integer)
            .with_default(DefaultValue::Int(512))
            .with_constraint(DIMENSION),
        FieldSpec::optional("height", FieldKind::Integer)
            .with_default(DefaultValue::Int(512))
            .with_constraint(DIMENSION),
        FieldSpec::optional("batch_size", FieldKind::Integer)
            .with_default(DefaultValue::Int(1))
            .with_constraint(BATCH),
        FieldSpec::optional("n_iter", FieldKind::Integer)
            .with_default(DefaultValue::Int(1))
            .with_constraint(BATCH),
        FieldSpec::optional("restore_faces", FieldKind::Boolean)
            .with_default(DefaultValue::Bool(false)),
        FieldSpec::optional("include_init_images", FieldKind::Boolean)
            .with_default(DefaultValue::Bool(false)),
        FieldSpec::optional("override_settings", FieldKind::Object)
            .with_default(DefaultValue::EmptyObject),
        FieldSpec::optional("alwayson_scripts", FieldKind::Object)
            .with_default(DefaultValue::EmptyObject),
        FieldSpec::optional("send_images", FieldKind::Boolean).with_default(DefaultValue::Bool(true)),
        FieldSpec::optional("save_images", FieldKind::Boolean)
            .with_default(DefaultValue::Bool(false)),
    ],
};

pub static INTERROGATE_SCHEMA: Schema = Schema {
    name: "payload",
    fields: &[
        FieldSpec::required("image", FieldKind::String).with_constraint(Constraint::NonEmpty),
        FieldSpec::optional("model", FieldKind::String)
            .with_default(DefaultValue::Str("clip"))
            .with_constraint(Constraint::OneOf(INTERROGATE_MODELS)),
    ],
};

/// One row of the payload schema table.
#[derive(Debug)]
pub struct PayloadSchemaEntry {
    pub endpoint: &'static str,
    /// `None` applies the schema to every method.
    pub method: Option<Method>,
    pub schema: &'static Schema,
}

/// Endpoints whose payload is validated. Anything else passes through.
pub static PAYLOAD_SCHEMAS: &[PayloadSchemaEntry] = &[
    PayloadSchemaEntry {
        endpoint: ENDPOINT_SYNC,
        method: None,
        schema: &SYNC_SCHEMA,
    },
    PayloadSchemaEntry {
        endpoint: ENDPOINT_DOWNLOAD,
        method: None,
        schema: &DOWNLOAD_SCHEMA,
    },
    PayloadSchemaEntry {
        endpoint: ENDPOINT_TXT2IMG,
        method: None,
        schema: &TXT2IMG_SCHEMA,
    },
    PayloadSchemaEntry {
        endpoint: ENDPOINT_IMG2IMG,
        method: None,
        schema: &IMG2IMG_SCHEMA,
    },
    PayloadSchemaEntry {
        endpoint: ENDPOINT_INTERROGATE,
        method: Some(Method::Post),
        schema: &INTERROGATE_SCHEMA,
    },
];

/// Look up the payload schema for a normalized endpoint and method.
pub fn payload_schema_for(endpoint: &str, method: Method) -> Option<&'static Schema> {
    PAYLOAD_SCHEMAS
        .iter()
        .find(|entry| {
            entry.endpoint == endpoint && entry.method.is_none_or(|m| m == method)
        })
        .map(|entry| entry.schema)
}
