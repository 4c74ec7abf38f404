//! Operation dispatch onto the store.

use crate::api::error::ApiError;
use crate::api::model::{parse_id, parse_payload, ApiRequest, FaultKind, Operation, Reply};
use crate::store::ResourceStore;

/// Run one request against the store.
///
/// Bad input is reported as an error value before the store is touched.
/// `FaultKind::Panic` panics on purpose; callers isolate it.
pub fn execute(store: &ResourceStore, request: &ApiRequest) -> Result<Reply, ApiError> {
    let raw_id = request.raw_id.as_deref();
    let raw_body = request.raw_body.as_deref();

    match request.operation {
        Operation::Create => {
            let payload = parse_payload(raw_body)?;
            Ok(Reply::Created(store.create(payload.name)))
        }
        Operation::List => Ok(Reply::Listed(store.list())),
        Operation::Get => {
            let id = parse_id(raw_id)?;
            Ok(Reply::Found(store.get(id)?))
        }
        Operation::Update => {
            let id = parse_id(raw_id)?;
            let payload = match parse_payload(raw_body) {
                Ok(payload) => payload,
                Err(err) => {
                    // An absent id outranks a bad body.
                    store.get(id)?;
                    return Err(err);
                }
            };
            Ok(Reply::Updated(store.update(id, payload.name)?))
        }
        Operation::Delete => {
            let id = parse_id(raw_id)?;
            store.delete(id)?;
            Ok(Reply::Deleted)
        }
        Operation::InjectFault(FaultKind::Explicit) => {
            Err(ApiError::Internal("injected server fault".to_string()))
        }
        Operation::InjectFault(FaultKind::Panic) => panic!("injected panic"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Resource;

    #[test]
    fn test_crud_flow() {
        let store = ResourceStore::new();

        let created = execute(
            &store,
            &ApiRequest::new(Operation::Create).with_body(r#"{"name":"a"}"#),
        )
        .unwrap();
        assert_eq!(created, Reply::Created(Resource { id: 1, name: "a".into() }));

        let updated = execute(
            &store,
            &ApiRequest::new(Operation::Update)
                .with_id("1")
                .with_body(r#"{"name":"b"}"#),
        )
        .unwrap();
        assert_eq!(updated, Reply::Updated(Resource { id: 1, name: "b".into() }));

        assert_eq!(
            execute(&store, &ApiRequest::new(Operation::Get).with_id("1")).unwrap(),
            Reply::Found(Resource { id: 1, name: "b".into() })
        );
        assert_eq!(
            execute(&store, &ApiRequest::new(Operation::Delete).with_id("1")).unwrap(),
            Reply::Deleted
        );
        assert_eq!(
            execute(&store, &ApiRequest::new(Operation::Delete).with_id("1")),
            Err(ApiError::NotFound(1))
        );
    }

    #[test]
    fn test_update_validates_id_before_body() {
        let store = ResourceStore::new();
        let err = execute(&store, &ApiRequest::new(Operation::Update).with_id("abc")).unwrap_err();
        assert_eq!(err, ApiError::InvalidId("abc".into()));
    }

    #[test]
    fn test_update_reports_missing_id_before_bad_body() {
        let store = ResourceStore::new();
        let err = execute(
            &store,
            &ApiRequest::new(Operation::Update).with_id("9").with_body("{"),
        )
        .unwrap_err();
        assert_eq!(err, ApiError::NotFound(9));

        store.create("present");
        let err = execute(
            &store,
            &ApiRequest::new(Operation::Update).with_id("1").with_body("{"),
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidBody(_)));
    }

    #[test]
    fn test_update_missing_id_with_valid_body() {
        let store = ResourceStore::new();
        let err = execute(
            &store,
            &ApiRequest::new(Operation::Update)
                .with_id("5")
                .with_body(r#"{"name":"x"}"#),
        )
        .unwrap_err();
        assert_eq!(err, ApiError::NotFound(5));
        assert!(store.is_empty());
    }

    #[test]
    fn test_bad_create_body_does_not_allocate() {
        let store = ResourceStore::new();
        assert!(execute(&store, &ApiRequest::new(Operation::Create).with_body("nope")).is_err());
        let created = store.create("first");
        assert_eq!(created.id, 1);
    }

    #[test]
    fn test_explicit_fault() {
        let store = ResourceStore::new();
        let err = execute(&store, &ApiRequest::new(Operation::InjectFault(FaultKind::Explicit)))
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
