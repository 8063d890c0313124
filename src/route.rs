use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::GridError;

/// Row actions offered by the action column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    View,
    Update,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::View => "view",
            ActionKind::Update => "update",
        }
    }
}

pub trait RouteResolver {
    fn resolve(&self, action: ActionKind, id: &str) -> String;

    /// Location without the record id, the client script appends the id itself.
    fn prefix(&self, action: ActionKind) -> String {
        self.resolve(action, "")
    }
}

/// Routes built from `{controller}`, `{action}` and `{id}` placeholders.
#[derive(Debug, Clone)]
pub struct TemplateRoutes {
    controller: String,
    template: String,
}

impl TemplateRoutes {
    pub const DEFAULT_TEMPLATE: &'static str = "/{controller}/{action}?id={id}";

    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            template: Self::DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// The id placeholder has to be last so the client script can append ids to the prefix.
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self, GridError> {
        let template = template.into();
        if !template.ends_with("{id}") {
            return Err(GridError::config(format!(
                "route template '{template}' has to end with {{id}}"
            )));
        }
        self.template = template;
        Ok(self)
    }
}

impl RouteResolver for TemplateRoutes {
    fn resolve(&self, action: ActionKind, id: &str) -> String {
        self.template
            .replace("{controller}", &urlencoding::encode(&self.controller))
            .replace("{action}", action.name())
            .replace("{id}", &urlencoding::encode(id))
    }
}

/// Moves the presentation context to another location.
pub trait Navigator {
    fn navigate(&mut self, url: &str) -> Result<(), GridError>;
}

/// Opens locations with the system browser.
#[derive(Debug, Default)]
pub struct SystemNavigator {
    /// Prepended to relative locations.
    pub base_url: Option<String>,
}

impl Navigator for SystemNavigator {
    fn navigate(&mut self, url: &str) -> Result<(), GridError> {
        let target = match &self.base_url {
            Some(base) if url.starts_with('/') => format!("{}{}", base.trim_end_matches('/'), url),
            _ => url.to_string(),
        };
        info!("Navigating to {target}");
        open::that(&target).map_err(|e| GridError::Navigation(format!("{target}: {e}")))
    }
}
