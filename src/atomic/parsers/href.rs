use axum::http::Uri;

use crate::atomic::values::{Href, ParsedHref};
use crate::error::ResolutionError;
use crate::model::{ResourceId, ResourceType};
use crate::schema::SchemaContainer;
use crate::server::Server;

/// Resolves hrefs of the form `{base}/{type}[/{id}[/relationships/{name}]]`.
pub struct HrefParser<'a> {
    server: &'a dyn Server,
}

impl<'a> HrefParser<'a> {
    pub fn new(server: &'a dyn Server) -> Self {
        Self { server }
    }

    pub fn schemas(&self) -> &SchemaContainer {
        self.server.schemas()
    }

    /// Resolve `href`, or `None` if it is not one of our routes.
    pub fn safe(&self, href: &Href) -> Option<ParsedHref> {
        let path = path_of(href.as_str())?;
        let base = path_of(self.server.url()).unwrap_or_default();
        let relative = strip_base(&path, &base)?;

        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        let (uri_type, id, relationship) = match segments.as_slice() {
            [uri_type] => (*uri_type, None, None),
            [uri_type, id] => (*uri_type, Some(*id), None),
            [uri_type, id, "relationships", relationship] => {
                (*uri_type, Some(*id), Some(*relationship))
            }
            _ => return None,
        };

        let schemas = self.server.schemas();
        let resource_type: ResourceType = schemas.schema_type_for_uri(uri_type)?.clone();
        let schema = schemas.schema_for(&resource_type)?;

        let id = match id {
            Some(value) if schema.id_matches(value) => Some(ResourceId::new(value).ok()?),
            Some(_) => return None,
            None => None,
        };

        let relationship = match relationship {
            Some(uri_name) => Some(schema.relationship_for_uri(uri_name)?.name.clone()),
            None => None,
        };

        Some(ParsedHref {
            href: href.clone(),
            resource_type,
            id,
            relationship,
        })
    }

    pub fn parse(&self, href: &Href) -> Result<ParsedHref, ResolutionError> {
        self.safe(href).ok_or_else(|| ResolutionError {
            href: href.to_string(),
        })
    }

    pub fn has_relationship(&self, href: &Href) -> bool {
        self.safe(href)
            .map(|parsed| parsed.relationship.is_some())
            .unwrap_or(false)
    }
}

/// The path component of an absolute or relative URL.
fn path_of(value: &str) -> Option<String> {
    if value.is_empty() {
        return Some(String::new());
    }
    let uri: Uri = value.parse().ok()?;
    Some(uri.path().trim_end_matches('/').to_string())
}

fn strip_base<'p>(path: &'p str, base: &str) -> Option<&'p str> {
    if base.is_empty() || base == "/" {
        return Some(path);
    }
    let rest = path.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cardinality, IdPattern, ResourceSchema, SchemaContainer};
    use crate::server::JsonApiServer;
    use std::sync::Arc;

    fn rt(value: &str) -> ResourceType {
        ResourceType::new(value).unwrap()
    }

    fn server(base: &str) -> JsonApiServer {
        let schemas = SchemaContainer::new(vec![
            ResourceSchema::new(rt("comments")),
            ResourceSchema::new(rt("blogPosts"))
                .with_uri_type("blog-posts")
                .with_id(IdPattern::Numeric)
                .with_relationship("tags", rt("tags"), Cardinality::ToMany)
                .with_relationship("author", rt("users"), Cardinality::ToOne),
        ]);
        JsonApiServer::new(base, Arc::new(schemas))
    }

    #[test]
    fn test_collection_href() {
        let server = server("/api/v1");
        let parser = HrefParser::new(&server);

        let parsed = parser.safe(&Href::new("/api/v1/comments")).unwrap();
        assert_eq!(parsed.resource_type, "comments");
        assert_eq!(parsed.id, None);
        assert_eq!(parsed.relationship, None);
    }

    #[test]
    fn test_resource_and_relationship_hrefs() {
        let server = server("http://localhost/api/v1");
        let parser = HrefParser::new(&server);

        let resource = parser
            .safe(&Href::new("http://localhost/api/v1/blog-posts/12"))
            .unwrap();
        assert_eq!(resource.resource_type, "blogPosts");
        assert_eq!(resource.id.unwrap(), "12");

        let relationship = parser
            .parse(&Href::new("/api/v1/blog-posts/12/relationships/tags/"))
            .unwrap();
        assert_eq!(relationship.relationship.as_deref(), Some("tags"));
        assert!(parser.has_relationship(&Href::new("/api/v1/blog-posts/12/relationships/author")));
        assert!(!parser.has_relationship(&Href::new("/api/v1/blog-posts/12")));
    }

    #[test]
    fn test_unmatched_hrefs() {
        let server = server("/api/v1");
        let parser = HrefParser::new(&server);

        for href in [
            "/api/v1/unknown",
            "/api/v1/blogPosts/1",
            "/api/v1/blog-posts/abc",
            "/api/v1/blog-posts/1/relationships/nope",
            "/api/v1/blog-posts/1/author",
            "/api/v2/comments",
            "/api/v1comments",
            "/api/v1",
        ] {
            assert!(parser.safe(&Href::new(href)).is_none(), "{} should not match", href);
        }

        let err = parser.parse(&Href::new("/api/v1/unknown")).unwrap_err();
        assert_eq!(err.href, "/api/v1/unknown");
    }

    #[test]
    fn test_empty_base_url() {
        let server = server("");
        let parser = HrefParser::new(&server);
        let parsed = parser.safe(&Href::new("/comments/5")).unwrap();
        assert_eq!(parsed.id.unwrap(), "5");
    }
}
