use super::Service;
use crate::error::Result;
use crate::store::Queries;
use crate::types::{HttpResponse, HttpResponseAssert, HttpResponseHeader, HttpVersion, Id};

impl Service {
    fn collect_workspaces<T>(
        &self,
        user_id: Id,
        list: impl Fn(&Queries<'_>, Id) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        let workspaces = self.user_workspaces(user_id)?;
        self.store.read(|q| {
            let mut out = Vec::new();
            for ws in workspaces {
                out.extend(list(q, ws)?);
            }
            Ok(out)
        })
    }

    pub fn response_collection(&self, user_id: Id) -> Result<Vec<HttpResponse>> {
        self.collect_workspaces(user_id, |q, ws| q.responses().list_responses(ws))
    }

    pub fn response_header_collection(&self, user_id: Id) -> Result<Vec<HttpResponseHeader>> {
        self.collect_workspaces(user_id, |q, ws| q.responses().list_headers(ws))
    }

    pub fn response_assert_collection(&self, user_id: Id) -> Result<Vec<HttpResponseAssert>> {
        self.collect_workspaces(user_id, |q, ws| q.responses().list_asserts(ws))
    }

    pub fn version_collection(&self, user_id: Id) -> Result<Vec<HttpVersion>> {
        self.collect_workspaces(user_id, |q, ws| q.responses().list_versions(ws))
    }
}
