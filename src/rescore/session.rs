//! Access control and the cache of the uploaded sheet.

use std::rc::Rc;

use crate::rescore::{io_common::Table, *};

/// Gives access to the upload when the operator knows the admin secret.
///
/// Only the digest of the secret is kept.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AdminGate {
    secret_digest: Option<String>,
}

impl AdminGate {
    pub fn with_secret(secret: Option<&str>) -> AdminGate {
        AdminGate {
            secret_digest: secret.filter(|s| !s.is_empty()).map(sha256::digest),
        }
    }

    /// Reads the secret from the given environment variable.
    pub fn from_env(var_name: &str) -> AdminGate {
        let gate = AdminGate::with_secret(std::env::var(var_name).ok().as_deref());
        if gate.is_open() {
            info!(
                "AdminGate: {} is not set, uploads are not protected",
                var_name
            );
        } else {
            debug!("AdminGate: secret read from {}", var_name);
        }
        gate
    }

    pub fn is_open(&self) -> bool {
        self.secret_digest.is_none()
    }

    pub fn check(&self, password: Option<&str>) -> RescoreResult<()> {
        match (&self.secret_digest, password) {
            (None, _) => Ok(()),
            (Some(expected), Some(p)) => {
                let given = sha256::digest(p);
                if constant_time_eq(expected.as_bytes(), given.as_bytes()) {
                    Ok(())
                } else {
                    warn!("AdminGate: wrong password");
                    AccessDeniedSnafu {}.fail()
                }
            }
            (Some(_), None) => AccessDeniedSnafu {}.fail(),
        }
    }
}

// No early exit on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// How an uploaded file should be parsed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourceSettings {
    pub provider: Provider,
    pub excel_worksheet_name: Option<String>,
    /// Index of the first data row, starting at 1.
    pub first_data_row: usize,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    Excel,
    Csv,
}

impl Provider {
    pub fn parse(s: &str) -> RescoreResult<Provider> {
        match s {
            "excel" | "xlsx" => Ok(Provider::Excel),
            "csv" => Ok(Provider::Csv),
            x => UnknownProviderSnafu { input_type: x }.fail(),
        }
    }

    /// Guesses the provider from the extension of the file.
    pub fn from_path(path: &str) -> Provider {
        if path.to_lowercase().ends_with(".csv") {
            Provider::Csv
        } else {
            Provider::Excel
        }
    }
}

/// The state kept between analyses: the most recently uploaded table.
pub struct Session {
    gate: AdminGate,
    // Upload identity and parsed table.
    cached: Option<(String, Rc<Table>)>,
}

impl Session {
    pub fn new(gate: AdminGate) -> Session {
        Session { gate, cached: None }
    }

    /// Checks the credentials and parses the upload.
    ///
    /// An upload with the same content and settings as the previous one
    /// returns the table parsed previously.
    pub fn upload(
        &mut self,
        password: Option<&str>,
        name: &str,
        bytes: &[u8],
        settings: &SourceSettings,
    ) -> RescoreResult<Rc<Table>> {
        self.gate.check(password)?;

        let identity = upload_identity(bytes, settings);
        if let Some((cached_identity, table)) = &self.cached {
            if *cached_identity == identity {
                debug!("Session::upload: {} unchanged, reusing the table", name);
                return Ok(table.clone());
            }
        }

        info!(
            "Session::upload: reading {} ({} bytes, {:?})",
            name,
            bytes.len(),
            settings.provider
        );
        let table = Rc::new(read_table(bytes, settings)?);
        if table.rows.is_empty() {
            return EmptyTableSnafu { name }.fail();
        }
        self.cached = Some((identity, table.clone()));
        Ok(table)
    }

    #[cfg(test)]
    pub fn table(&self) -> Option<Rc<Table>> {
        self.cached.as_ref().map(|(_, t)| t.clone())
    }
}

fn upload_identity(bytes: &[u8], settings: &SourceSettings) -> String {
    format!(
        "{}:{:?}:{:?}:{}",
        sha256::digest(bytes),
        settings.provider,
        settings.excel_worksheet_name,
        settings.first_data_row
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_settings() -> SourceSettings {
        SourceSettings {
            provider: Provider::Csv,
            excel_worksheet_name: None,
            first_data_row: 1,
        }
    }

    #[test]
    fn open_gate() {
        let gate = AdminGate::with_secret(None);
        assert!(gate.is_open());
        assert!(gate.check(None).is_ok());
        assert!(gate.check(Some("anything")).is_ok());
        assert!(AdminGate::with_secret(Some("")).is_open());
    }

    #[test]
    fn gate_from_env() {
        let var_name = "RESCORE_SESSION_TEST_SECRET";
        std::env::remove_var(var_name);
        assert!(AdminGate::from_env(var_name).is_open());
        std::env::set_var(var_name, "pw");
        let gate = AdminGate::from_env(var_name);
        std::env::remove_var(var_name);
        assert!(!gate.is_open());
        assert!(gate.check(Some("pw")).is_ok());
        assert!(gate.check(Some("other")).is_err());
    }

    #[test]
    fn closed_gate() {
        let gate = AdminGate::with_secret(Some("s3cret"));
        assert!(!gate.is_open());
        assert!(gate.check(Some("s3cret")).is_ok());
        assert!(matches!(
            gate.check(Some("s3cret ")),
            Err(RescoreError::AccessDenied {})
        ));
        assert!(matches!(gate.check(None), Err(RescoreError::AccessDenied {})));
    }

    #[test]
    fn constant_time_comparison() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn providers() {
        assert_eq!(Provider::parse("csv").unwrap(), Provider::Csv);
        assert_eq!(Provider::parse("excel").unwrap(), Provider::Excel);
        assert!(Provider::parse("ods").is_err());
        assert_eq!(Provider::from_path("/tmp/Scores.CSV"), Provider::Csv);
        assert_eq!(Provider::from_path("scores.xlsx"), Provider::Excel);
    }

    #[test]
    fn cached_upload() {
        let mut session = Session::new(AdminGate::with_secret(None));
        assert!(session.table().is_none());
        let t1 = session
            .upload(None, "a.csv", b"1,2\n3,4\n", &csv_settings())
            .unwrap();
        let t2 = session
            .upload(None, "a.csv", b"1,2\n3,4\n", &csv_settings())
            .unwrap();
        assert!(Rc::ptr_eq(&t1, &t2));
        let t3 = session
            .upload(None, "b.csv", b"1,2\n", &csv_settings())
            .unwrap();
        assert!(!Rc::ptr_eq(&t1, &t3));
        assert_eq!(t3.rows.len(), 1);
        assert!(Rc::ptr_eq(&session.table().unwrap(), &t3));
    }

    #[test]
    fn denied_upload_keeps_cache() {
        let mut session = Session::new(AdminGate::with_secret(Some("pw")));
        session
            .upload(Some("pw"), "a.csv", b"1,2\n", &csv_settings())
            .unwrap();
        let res = session.upload(Some("nope"), "b.csv", b"5,6\n", &csv_settings());
        assert!(res.is_err());
        assert_eq!(session.table().unwrap().rows.len(), 1);
    }

    #[test]
    fn empty_upload() {
        let mut session = Session::new(AdminGate::with_secret(None));
        let res = session.upload(None, "empty.csv", b"header\n", &SourceSettings {
            first_data_row: 2,
            ..csv_settings()
        });
        assert!(matches!(res, Err(RescoreError::EmptyTable { .. })));
    }
}
