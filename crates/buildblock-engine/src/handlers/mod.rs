//! Built-in block handlers.
//!
//! - `remove`: drops the block when its directive matches the environment.
//! - `include`: replaces the block with the content of a file.
//! - `js` / `css`: point the block at a bundled asset, or inline asset content.
//! - `[attr]`: rewrites one attribute of every tag inside the block.
//! - `template`: renders the block content with the template data.

mod asset;
mod attr;
mod include;
mod remove;
mod template;

pub use asset::AssetHandler;
pub use attr::AttrHandler;
pub use include::IncludeHandler;
pub use remove::RemoveHandler;
pub use template::TemplateHandler;

/// Block type of the `remove` handler.
pub const REMOVE: &str = "remove";

/// Block type of the `include` handler.
pub const INCLUDE: &str = "include";

/// Block type of the `template` handler.
pub const TEMPLATE: &str = "template";

/// Registry key of the attribute handler, used for every `[name]` block type.
pub const ATTR: &str = "[attr]";

/// Strip one pair of matching quotes around a directive argument.
pub(crate) fn unquote(arg: &str) -> &str {
    let arg = arg.trim();
    ['"', '\'']
        .into_iter()
        .find_map(|q| arg.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
        .unwrap_or(arg)
}
