//! Computes the effective request a delta entry stands for.
//!
//! A delta overrides its parent field by field: `None` inherits, `Some(v)`
//! replaces (a cleared override is stored as the zero value, so it replaces
//! too). Child collections are merged by parent id, delta-only rows are
//! appended and the result is re-sorted by display order.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::store::Queries;
use crate::types::{
    BodyKind, CompressionType, Http, HttpAssert, HttpBodyRaw, HttpKeyValue, Id, KeyValueKind,
};

/// A child row that can be overlaid onto its parent row.
pub trait Overlay: Clone {
    fn id(&self) -> Id;

    fn parent_id(&self) -> Option<Id>;

    fn display_order(&self) -> f64;

    /// This delta row's overrides applied over `base`, as a plain row.
    fn overlay(&self, base: &Self) -> Self;
}

fn pick<T: Clone>(delta: &Option<T>, base: &T) -> T {
    delta.as_ref().unwrap_or(base).clone()
}

impl Overlay for HttpKeyValue {
    fn id(&self) -> Id {
        self.id
    }

    fn parent_id(&self) -> Option<Id> {
        self.parent_id
    }

    fn display_order(&self) -> f64 {
        self.display_order
    }

    fn overlay(&self, base: &Self) -> Self {
        Self {
            key: pick(&self.delta_key, &base.key),
            value: pick(&self.delta_value, &base.value),
            enabled: pick(&self.delta_enabled, &base.enabled),
            description: pick(&self.delta_description, &base.description),
            display_order: pick(&self.delta_display_order, &base.display_order),
            is_delta: false,
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
            ..base.clone()
        }
    }
}

impl Overlay for HttpAssert {
    fn id(&self) -> Id {
        self.id
    }

    fn parent_id(&self) -> Option<Id> {
        self.parent_id
    }

    fn display_order(&self) -> f64 {
        self.display_order
    }

    fn overlay(&self, base: &Self) -> Self {
        Self {
            value: pick(&self.delta_value, &base.value),
            enabled: pick(&self.delta_enabled, &base.enabled),
            description: pick(&self.delta_description, &base.description),
            display_order: pick(&self.delta_display_order, &base.display_order),
            is_delta: false,
            parent_id: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
            ..base.clone()
        }
    }
}

/// Effective scalar fields of `delta` over `base`. Deltas are one level
/// deep, so `base` must itself be a base entry.
pub fn resolve_http(delta: &Http, base: &Http) -> Result<Http> {
    if !delta.is_delta {
        return Err(Error::NotDelta("http".into()));
    }
    if delta.parent_http_id != Some(base.id) {
        return Err(Error::Constraint("delta does not reference this parent".into()));
    }
    if !base.is_base() {
        return Err(Error::Constraint("delta parent must be a base entry".into()));
    }

    Ok(Http {
        id: delta.id,
        name: pick(&delta.delta_name, &base.name),
        url: pick(&delta.delta_url, &base.url),
        method: pick(&delta.delta_method, &base.method),
        ..base.clone()
    })
}

fn by_display_order<T: Overlay>(a: &T, b: &T) -> Ordering {
    a.display_order()
        .total_cmp(&b.display_order())
        .then_with(|| a.id().cmp(&b.id()))
}

/// Merges the children of a delta entry into its parent's children.
pub fn resolve_children<T: Overlay>(base: Vec<T>, deltas: Vec<T>) -> Vec<T> {
    let mut by_parent = HashMap::new();
    let mut delta_only = Vec::new();
    for delta in deltas {
        match delta.parent_id() {
            Some(parent) => {
                by_parent.insert(parent, delta);
            }
            None => delta_only.push(delta),
        }
    }

    let mut merged: Vec<T> = base
        .into_iter()
        .map(|row| match by_parent.get(&row.id()) {
            Some(delta) => delta.overlay(&row),
            None => row,
        })
        .collect();
    merged.extend(delta_only.iter().map(|row| row.overlay(row)));
    merged.sort_by(by_display_order);
    merged
}

/// Effective raw body bytes together with how they are compressed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBody {
    pub data: Vec<u8>,
    pub compression_type: CompressionType,
}

impl ResolvedBody {
    fn of(body: &HttpBodyRaw) -> Self {
        Self {
            data: body.raw_data.clone(),
            compression_type: body.compression_type,
        }
    }
}

/// An override that is present wins, even when empty.
pub fn resolve_body_raw(
    delta: Option<&HttpBodyRaw>,
    base: Option<&HttpBodyRaw>,
) -> Option<ResolvedBody> {
    if let Some(delta) = delta.filter(|d| d.is_delta) {
        if let Some(data) = &delta.delta_raw_data {
            return Some(ResolvedBody {
                data: data.clone(),
                compression_type: delta.compression_type,
            });
        }
    }
    base.map(ResolvedBody::of)
}

/// The body an executor should send, rendered by body kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Raw(Vec<u8>),
    Form(Vec<(String, String)>),
    UrlEncoded(String),
}

/// Everything needed to issue one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub http: Http,
    pub headers: Vec<HttpKeyValue>,
    pub search_params: Vec<HttpKeyValue>,
    pub body_form: Vec<HttpKeyValue>,
    pub body_urlencoded: Vec<HttpKeyValue>,
    pub asserts: Vec<HttpAssert>,
    pub body_raw: Option<ResolvedBody>,
}

fn enabled_pairs(rows: &[HttpKeyValue]) -> impl Iterator<Item = (&str, &str)> {
    rows.iter()
        .filter(|row| row.enabled)
        .map(|row| (row.key.as_str(), row.value.as_str()))
}

fn encode_pairs<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl ResolvedRequest {
    pub fn key_values(&self, kind: KeyValueKind) -> &[HttpKeyValue] {
        match kind {
            KeyValueKind::Header => &self.headers,
            KeyValueKind::SearchParam => &self.search_params,
            KeyValueKind::BodyForm => &self.body_form,
            KeyValueKind::BodyUrlEncoded => &self.body_urlencoded,
        }
    }

    /// The URL with enabled search parameters appended.
    #[must_use]
    pub fn url(&self) -> String {
        let query = encode_pairs(enabled_pairs(&self.search_params));
        if query.is_empty() {
            return self.http.url.clone();
        }
        let sep = if self.http.url.contains('?') { '&' } else { '?' };
        format!("{}{sep}{query}", self.http.url)
    }

    #[must_use]
    pub fn enabled_headers(&self) -> Vec<(String, String)> {
        enabled_pairs(&self.headers)
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Enabled assert expressions, in order.
    #[must_use]
    pub fn enabled_asserts(&self) -> Vec<&str> {
        self.asserts
            .iter()
            .filter(|a| a.enabled)
            .map(|a| a.value.as_str())
            .collect()
    }

    pub fn body(&self) -> Result<RequestBody> {
        Ok(match self.http.body_kind {
            BodyKind::None => RequestBody::Empty,
            BodyKind::Raw => match &self.body_raw {
                Some(body) => RequestBody::Raw(body.compression_type.decode(&body.data)?),
                None => RequestBody::Empty,
            },
            BodyKind::FormData => RequestBody::Form(
                enabled_pairs(&self.body_form)
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            BodyKind::UrlEncoded => {
                RequestBody::UrlEncoded(encode_pairs(enabled_pairs(&self.body_urlencoded)))
            }
        })
    }
}

/// Loads and resolves the entry `http_id`. Base entries resolve to
/// themselves.
pub fn resolve_request(q: &Queries<'_>, http_id: Id) -> Result<ResolvedRequest> {
    let http = q.http().get(http_id)?.ok_or_else(|| Error::not_found("http"))?;

    let load_kv = |kind: KeyValueKind, base_id: Option<Id>| -> Result<Vec<HttpKeyValue>> {
        let own = q.key_values(kind).get_by_http(http.id)?;
        match base_id {
            Some(base_id) => Ok(resolve_children(
                q.key_values(kind).get_by_http(base_id)?,
                own,
            )),
            None => Ok(own),
        }
    };

    if !http.is_delta {
        return Ok(ResolvedRequest {
            headers: load_kv(KeyValueKind::Header, None)?,
            search_params: load_kv(KeyValueKind::SearchParam, None)?,
            body_form: load_kv(KeyValueKind::BodyForm, None)?,
            body_urlencoded: load_kv(KeyValueKind::BodyUrlEncoded, None)?,
            asserts: q.asserts().get_by_http(http.id)?,
            body_raw: q.body_raw().get_by_http(http.id)?.as_ref().map(ResolvedBody::of),
            http,
        });
    }

    let base_id = http
        .parent_http_id
        .ok_or_else(|| Error::Constraint("a delta entry requires a parent".into()))?;
    let base = q
        .http()
        .get(base_id)?
        .ok_or_else(|| Error::not_found("parent http"))?;

    let delta_body = q.body_raw().get_by_http(http.id)?;
    let base_body = q.body_raw().get_by_http(base.id)?;

    Ok(ResolvedRequest {
        headers: load_kv(KeyValueKind::Header, Some(base.id))?,
        search_params: load_kv(KeyValueKind::SearchParam, Some(base.id))?,
        body_form: load_kv(KeyValueKind::BodyForm, Some(base.id))?,
        body_urlencoded: load_kv(KeyValueKind::BodyUrlEncoded, Some(base.id))?,
        asserts: resolve_children(
            q.asserts().get_by_http(base.id)?,
            q.asserts().get_by_http(http.id)?,
        ),
        body_raw: resolve_body_raw(delta_body.as_ref(), base_body.as_ref()),
        http: resolve_http(&http, &base)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{BodyRawDeltaPatch, HttpDeltaPatch, KeyValueDeltaPatch, Patch, PatchValue};
    use crate::store::test_support::*;
    use crate::types::{HttpMethod, now_ms};

    fn kv(http_id: Id, key: &str, value: &str, order: f64) -> HttpKeyValue {
        HttpKeyValue {
            id: Id::new(),
            http_id,
            key: key.into(),
            value: value.into(),
            enabled: true,
            description: String::new(),
            display_order: order,
            is_delta: false,
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
            created_at: now_ms(),
            updated_at: now_ms(),
        }
    }

    fn delta_of(parent: &HttpKeyValue, http_id: Id) -> HttpKeyValue {
        HttpKeyValue {
            id: Id::new(),
            http_id,
            is_delta: true,
            parent_id: Some(parent.id),
            ..parent.clone()
        }
    }

    #[test]
    fn test_http_three_states() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let mut delta = delta_http(&base);

        let effective = resolve_http(&delta, &base).unwrap();
        assert_eq!(effective.name, base.name);
        assert_eq!(effective.url, base.url);
        assert_eq!(effective.method, HttpMethod::Get);

        HttpDeltaPatch {
            url: Some(PatchValue::Value("https://staging.example.com".into())),
            name: Some(PatchValue::Unset),
            ..Default::default()
        }
        .apply(&mut delta);

        let effective = resolve_http(&delta, &base).unwrap();
        assert_eq!(effective.id, delta.id);
        assert_eq!(effective.name, "");
        assert_eq!(effective.url, "https://staging.example.com");
        assert_eq!(effective.method, HttpMethod::Get);
    }

    #[test]
    fn test_delta_of_delta_rejected() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let delta = delta_http(&base);
        let nested = delta_http(&delta);
        assert!(matches!(
            resolve_http(&nested, &delta),
            Err(Error::Constraint(_))
        ));
    }

    #[test]
    fn test_children_replace_append_and_sort() {
        let http = Id::new();
        let delta_http = Id::new();
        let a = kv(http, "A", "1", 1.0);
        let b = kv(http, "B", "2", 2.0);

        let mut moved = delta_of(&b, delta_http);
        moved.delta_display_order = Some(0.5);
        let mut extra = kv(delta_http, "C", "3", 1.5);
        extra.is_delta = true;

        let merged = resolve_children(vec![a.clone(), b.clone()], vec![moved, extra]);
        let keys: Vec<_> = merged.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
        assert_eq!(merged[0].id, b.id);
        assert!(merged.iter().all(|r| !r.is_delta));
    }

    #[test]
    fn test_delta_header_override_and_clear() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let delta = delta_http(&base);
        let h0 = kv(base.id, "X-API-Key", "abc", 1.0);
        let mut h1 = delta_of(&h0, delta.id);
        h1.delta_value = Some("zzz".into());

        t.store
            .transact(|q| {
                q.http().create(&base)?;
                q.http().create(&delta)?;
                q.key_values(KeyValueKind::Header).create(&h0)?;
                q.key_values(KeyValueKind::Header).create(&h1)
            })
            .unwrap();

        let resolved = t.store.read(|q| resolve_request(q, delta.id)).unwrap();
        assert_eq!(resolved.headers.len(), 1);
        assert_eq!(resolved.headers[0].key, "X-API-Key");
        assert_eq!(resolved.headers[0].value, "zzz");
        assert!(resolved.headers[0].enabled);

        let patch = KeyValueDeltaPatch {
            value: Some(PatchValue::Unset),
            ..Default::default()
        };
        t.store
            .transact(|q| q.key_values(KeyValueKind::Header).update_delta(h1.id, &patch))
            .unwrap();

        let resolved = t.store.read(|q| resolve_request(q, delta.id)).unwrap();
        assert_eq!(resolved.headers[0].key, "X-API-Key");
        assert_eq!(resolved.headers[0].value, "");
        assert!(resolved.headers[0].enabled);
    }

    #[test]
    fn test_raw_body_three_states() {
        let t = test_store();
        let base = base_http(t.workspace_id);
        let delta = delta_http(&base);
        let parent = HttpBodyRaw {
            id: Id::new(),
            http_id: base.id,
            raw_data: vec![0x01, 0x02],
            compression_type: CompressionType::None,
            is_delta: false,
            parent_body_raw_id: None,
            delta_raw_data: None,
            created_at: now_ms(),
            updated_at: now_ms(),
        };
        t.store
            .transact(|q| {
                q.http().create(&base)?;
                q.http().create(&delta)?;
                q.body_raw().create(&parent)
            })
            .unwrap();

        let body = |t: &TestStore| {
            t.store
                .read(|q| resolve_request(q, delta.id))
                .unwrap()
                .body_raw
                .unwrap()
                .data
        };
        assert_eq!(body(&t), vec![0x01, 0x02]);

        let child = HttpBodyRaw {
            id: Id::new(),
            http_id: delta.id,
            is_delta: true,
            parent_body_raw_id: Some(parent.id),
            delta_raw_data: Some(b"Z".to_vec()),
            ..parent.clone()
        };
        t.store.transact(|q| q.body_raw().create(&child)).unwrap();
        assert_eq!(body(&t), b"Z".to_vec());

        let clear = BodyRawDeltaPatch {
            data: Some(PatchValue::Unset),
        };
        t.store
            .transact(|q| q.body_raw().update_delta(delta.id, &clear))
            .unwrap();
        assert_eq!(body(&t), Vec::<u8>::new());
    }

    #[test]
    fn test_rendering() {
        let mut http = base_http(Id::new());
        http.url = "https://api.example.com/search?v=1".into();
        http.body_kind = BodyKind::UrlEncoded;

        let mut disabled = kv(http.id, "skip", "me", 3.0);
        disabled.enabled = false;
        let request = ResolvedRequest {
            headers: vec![kv(http.id, "Accept", "application/json", 1.0)],
            search_params: vec![kv(http.id, "q", "a b&c", 1.0), disabled],
            body_form: Vec::new(),
            body_urlencoded: vec![kv(http.id, "name", "Zoë", 1.0)],
            asserts: Vec::new(),
            body_raw: None,
            http,
        };

        assert_eq!(
            request.url(),
            "https://api.example.com/search?v=1&q=a%20b%26c"
        );
        assert_eq!(
            request.enabled_headers(),
            vec![("Accept".to_string(), "application/json".to_string())]
        );
        assert_eq!(
            request.body().unwrap(),
            RequestBody::UrlEncoded("name=Zo%C3%AB".into())
        );
    }
}
