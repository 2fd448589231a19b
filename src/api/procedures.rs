//! Declared procedures, their kind and their input fields.
//!
//! The router mounts a handler for every entry; the dev panel renders the
//! list as documentation.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Query,
    Mutation,
}

impl ProcedureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
        }
    }

    pub fn http_method(self) -> &'static str {
        match self {
            ProcedureKind::Query => "GET",
            ProcedureKind::Mutation => "POST",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: &'static str,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcedureDef {
    pub path: &'static str,
    pub kind: ProcedureKind,
    pub description: &'static str,
    pub input: &'static [FieldDef],
}

const fn required(name: &'static str, ty: &'static str) -> FieldDef {
    FieldDef {
        name,
        ty,
        optional: false,
    }
}

const fn optional(name: &'static str, ty: &'static str) -> FieldDef {
    FieldDef {
        name,
        ty,
        optional: true,
    }
}

pub const HEALTH: &str = "health";
pub const VIDEOS_LIST: &str = "videos.list";
pub const VIDEOS_GET: &str = "videos.get";
pub const VIDEOS_CREATE: &str = "videos.create";
pub const VIDEOS_UPDATE: &str = "videos.update";
pub const CHANNELS_LIST: &str = "channels.list";
pub const CHANNELS_ADD: &str = "channels.add";

pub const PROCEDURES: &[ProcedureDef] = &[
    ProcedureDef {
        path: HEALTH,
        kind: ProcedureKind::Query,
        description: "Service status and current time",
        input: &[],
    },
    ProcedureDef {
        path: VIDEOS_LIST,
        kind: ProcedureKind::Query,
        description: "All videos, newest first",
        input: &[],
    },
    ProcedureDef {
        path: VIDEOS_GET,
        kind: ProcedureKind::Query,
        description: "One video by id",
        input: &[required("id", "string")],
    },
    ProcedureDef {
        path: VIDEOS_CREATE,
        kind: ProcedureKind::Mutation,
        description: "Store a new video",
        input: &[
            required("youtubeId", "string"),
            required("title", "string"),
            required("publishedAt", "string (RFC 3339)"),
        ],
    },
    ProcedureDef {
        path: VIDEOS_UPDATE,
        kind: ProcedureKind::Mutation,
        description: "Set the transcript and/or summary of a video; empty strings are ignored",
        input: &[
            required("id", "string"),
            optional("transcript", "string"),
            optional("summary", "string"),
        ],
    },
    ProcedureDef {
        path: CHANNELS_LIST,
        kind: ProcedureKind::Query,
        description: "Monitored channels (not persisted yet, always empty)",
        input: &[],
    },
    ProcedureDef {
        path: CHANNELS_ADD,
        kind: ProcedureKind::Mutation,
        description: "Acknowledge a channel to monitor (not persisted yet)",
        input: &[required("channelId", "string"), optional("name", "string")],
    },
];
