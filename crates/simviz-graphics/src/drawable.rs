//! Drawable descriptors bound to windows.
//!
//! The lifecycle core never looks inside a drawable: it only asks whether
//! the object can be shown at all and which session owns it, then hands it
//! to the toolkit unchanged.

use std::fmt;
use std::sync::Arc;

/// Identity of the remote session that produced a drawable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawableKind {
    Mesh,
    Contour,
    Vector,
    Surface,
    /// XY curves (residual monitors, line plots)
    XyPlot,
    /// Anything else; never graphics-capable
    Other(String),
}

impl DrawableKind {
    pub fn is_graphics(&self) -> bool {
        !matches!(self, DrawableKind::Other(_))
    }

    pub fn name(&self) -> &str {
        match self {
            DrawableKind::Mesh => "mesh",
            DrawableKind::Contour => "contour",
            DrawableKind::Vector => "vector",
            DrawableKind::Surface => "surface",
            DrawableKind::XyPlot => "xy-plot",
            DrawableKind::Other(name) => name,
        }
    }
}

impl fmt::Display for DrawableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A "what to render" descriptor supplied by the data layer.
pub trait Drawable: fmt::Debug + Send + Sync {
    fn kind(&self) -> DrawableKind;

    fn owning_session(&self) -> Option<SessionId> {
        None
    }

    /// Human readable caption used by toolkits for titles and exports.
    fn label(&self) -> String {
        self.kind().to_string()
    }
}

pub type DrawableRef = Arc<dyn Drawable>;

/// Plain descriptor for hosts that do not bring their own drawable type.
#[derive(Clone, Debug)]
pub struct GraphicsObject {
    kind: DrawableKind,
    name: String,
    session: Option<SessionId>,
}

impl GraphicsObject {
    pub fn new(kind: DrawableKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            session: None,
        }
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_ref(self) -> DrawableRef {
        Arc::new(self)
    }
}

impl Drawable for GraphicsObject {
    fn kind(&self) -> DrawableKind {
        self.kind.clone()
    }

    fn owning_session(&self) -> Option<SessionId> {
        self.session.clone()
    }

    fn label(&self) -> String {
        format!("{} ({})", self.name, self.kind)
    }
}
