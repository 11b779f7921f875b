//! Site-wide data shared by every page's render context.
//!
//! # Context layout
//!
//! | Key        | Source                                     |
//! |------------|--------------------------------------------|
//! | `site`     | `[site]` section of `kiln.toml`            |
//! | `extra`    | `[extra]` section of `kiln.toml`           |
//! | `<stem>`   | `<content>/_data/<stem>.{json,yaml,yml}`   |
//! | `pages`    | Every page in the store, see [`PageData`]  |
//!
//! Page front matter and route metadata are merged over this map, so a page
//! can shadow any global key for itself.
//!
//! # Usage in templates
//!
//! ```jinja
//! <title>{{ title | default(value=site.title) }}</title>
//! {% for link in nav.links %}<a href="{{ link.href }}">{{ link.label }}</a>{% endfor %}
//! {% for page in pages %}<a href="{{ page.url }}">{{ page.title }}</a>{% endfor %}
//! ```

mod shared;
mod types;

pub use shared::load_shared_data;
pub use types::PageData;
