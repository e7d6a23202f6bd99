//! Markup generation for resolved markers.

use crate::models::{Mode, RenderContext};

/// Capability for turning one resolved marker into final markup.
///
/// Callers substitute their own implementation to change the emitted markup;
/// the engines only ever call through this trait.
pub trait AssetRenderer {
  /// Produce the markup that replaces one marker occurrence.
  fn render(&self, context: &RenderContext<'_>) -> String;
}

/// Renderer used when the caller does not supply one.
///
/// Emits module script tags, preceded by the live-reload client tag in dev
/// mode and by stylesheet links in build mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer;

impl AssetRenderer for DefaultRenderer {
  fn render(&self, context: &RenderContext<'_>) -> String {
    let mut tags = Vec::new();
    if context.mode == Mode::Dev
      && let Some(client) = &context.client_url
    {
      tags.push(format!(r#"<script type="module" src="{client}"></script>"#));
    }
    for css in &context.css_urls {
      tags.push(format!(r#"<link rel="stylesheet" href="{css}" />"#));
    }
    tags.push(format!(
      r#"<script type="module" src="{}"></script>"#,
      context.js_url
    ));
    tags.join("\n")
  }
}
