//! Wire-format tests for request and response models.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use serde_json::json;

mod sync_tests {
    use super::*;
    use trust_gate::models::{SyncKeyRequest, SyncKeyResponse};

    #[test]
    fn test_sync_request_accepts_rfc3339_offsets() {
        let req: SyncKeyRequest = serde_json::from_value(json!({
            "service": "billing",
            "key": "abc",
            "expires_at": "2030-06-01T12:00:00+02:00"
        }))
        .unwrap();

        assert_eq!(
            req.expires_at,
            Some(Utc.with_ymd_and_hms(2030, 6, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_sync_request_null_expiry_is_none() {
        let req: SyncKeyRequest =
            serde_json::from_value(json!({"service": "a", "key": "b", "expires_at": null}))
                .unwrap();
        assert!(req.expires_at.is_none());
    }

    #[test]
    fn test_sync_request_rejects_bad_timestamp() {
        let result = serde_json::from_value::<SyncKeyRequest>(json!({
            "service": "a",
            "key": "b",
            "expires_at": "next tuesday"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_sync_response_shape() {
        let expires = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let json = serde_json::to_value(SyncKeyResponse {
            service: "billing".to_string(),
            synced: true,
            expires_at: Some(expires),
        })
        .unwrap();

        assert_eq!(
            json,
            json!({"service": "billing", "synced": true, "expires_at": "2030-01-01T00:00:00Z"})
        );
    }
}

mod status_tests {
    use super::*;
    use trust_gate::models::BootstrapStatusResponse;

    #[test]
    fn test_bootstrap_status_shape() {
        let mut services = BTreeMap::new();
        services.insert("auth".to_string(), false);
        services.insert("identity".to_string(), true);

        let json = serde_json::to_value(BootstrapStatusResponse {
            auth_key: BootstrapStatusResponse::NOT_RECEIVED,
            services,
        })
        .unwrap();

        assert_eq!(
            json,
            json!({"auth_key": "not received", "services": {"auth": false, "identity": true}})
        );
    }
}

mod identity_tests {
    use super::*;
    use trust_gate::models::{AdmissionPath, MeResponse, WhoAmIResponse};

    #[test]
    fn test_admission_path_labels() {
        assert_eq!(AdmissionPath::RegisteredKey.as_str(), "key");
        assert_eq!(AdmissionPath::Bootstrap.as_str(), "bootstrap");
    }

    #[test]
    fn test_whoami_shape() {
        let json = serde_json::to_value(WhoAmIResponse {
            service: "billing".to_string(),
            via: AdmissionPath::RegisteredKey.as_str(),
        })
        .unwrap();
        assert_eq!(json, json!({"service": "billing", "via": "key"}));
    }

    #[test]
    fn test_me_omits_missing_roles() {
        let json = serde_json::to_value(MeResponse {
            account_id: "acct-1".to_string(),
            roles: None,
        })
        .unwrap();
        assert_eq!(json, json!({"account_id": "acct-1"}));

        let json = serde_json::to_value(MeResponse {
            account_id: "acct-1".to_string(),
            roles: Some(json!({"billing": ["read"]})),
        })
        .unwrap();
        assert_eq!(json["roles"]["billing"][0], "read");
    }
}

mod error_tests {
    use trust_gate::error::ErrorResponse;

    use super::*;

    #[test]
    fn test_error_envelope_fields() {
        let json = serde_json::to_value(ErrorResponse {
            error: "unauthorized".to_string(),
            message: "invalid or expired token".to_string(),
            status: 401,
            causes: vec!["ExpiredSignature".to_string()],
        })
        .unwrap();

        assert_eq!(
            json,
            json!({
                "error": "unauthorized",
                "message": "invalid or expired token",
                "status": 401,
                "causes": ["ExpiredSignature"]
            })
        );
    }
}
