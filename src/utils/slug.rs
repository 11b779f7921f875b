//! Slug and identifier derivation for routes.
//!
//! A slug is the dash-joined form of a route url and is the key that ties a
//! page to its script component. The identifier is the camel-cased slug used
//! to name the imported component in generated bundle source.
//!
//! | url              | slug           | id            | last segment |
//! |------------------|----------------|---------------|--------------|
//! | `/`              | `home`         | `home`        | `home`       |
//! | `/about/`        | `about`        | `about`       | `about`      |
//! | `/blog/my-post/` | `blog-my-post` | `blogMyPost`  | `post`       |

/// Slug of the root route. Empty slugs are never produced.
pub const HOME_SLUG: &str = "home";

/// Derive the slug for a normalized route url.
pub fn route_slug(url: &str) -> String {
    let slug = url
        .split('/')
        .map(|segment| segment.split_whitespace().collect::<String>())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        HOME_SLUG.to_owned()
    } else {
        slug
    }
}

/// Trailing dash-separated segment of a slug.
pub fn last_segment(slug: &str) -> &str {
    slug.rsplit('-').next().unwrap_or(slug)
}

/// Camel-case a slug into a JavaScript identifier.
///
/// Characters that cannot appear in an identifier act as word breaks, and a
/// leading digit gets an underscore prefix.
pub fn camel_case_id(slug: &str) -> String {
    let mut id = String::with_capacity(slug.len());
    let mut upper_next = false;

    for c in slug.chars() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            if upper_next && !id.is_empty() {
                id.extend(c.to_uppercase());
            } else {
                id.push(c);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }

    if id.starts_with(|c: char| c.is_ascii_digit()) {
        id.insert(0, '_');
    }
    if id.is_empty() {
        id.push_str(HOME_SLUG);
    }
    id
}

/// Name under which a page's script is imported into the main bundle.
pub fn component_ident(id: &str) -> String {
    format!("{id}Component")
}
