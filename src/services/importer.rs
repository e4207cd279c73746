use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{
    constants::{INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH},
    error::{ServiceError, ValidationError},
    jwt::SessionData,
    permissions::ActionType,
    repository::CatalogRepository,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogRecord {
    name: String,
    measurement_unit: String,
}

fn parse_record(record: &StringRecord) -> Result<CatalogRecord, ValidationError> {
    let line = record.position().map_or(0, |position| position.line());
    let invalid = |reason: &str| ValidationError::InvalidRecord {
        line,
        reason: reason.to_string(),
    };

    let (Some(name), Some(measurement_unit)) = (record.get(0), record.get(1)) else {
        return Err(invalid("expected name and measurement unit"));
    };
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if measurement_unit.is_empty() {
        return Err(invalid("empty measurement unit"));
    }
    if name.chars().count() > INGREDIENT_NAME_MAX_LENGTH {
        return Err(invalid("name is too long"));
    }
    if measurement_unit.chars().count() > MEASUREMENT_UNIT_MAX_LENGTH {
        return Err(invalid("measurement unit is too long"));
    }

    Ok(CatalogRecord {
        name: name.to_string(),
        measurement_unit: measurement_unit.to_string(),
    })
}

fn read_records<R: Read>(reader: R) -> Result<Vec<CatalogRecord>, ValidationError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ValidationError::InvalidRecord {
            line: e.position().map_or(0, |position| position.line()),
            reason: e.to_string(),
        })?;

        // Blank lines come through as a single empty field
        if record.iter().all(str::is_empty) {
            continue;
        }

        records.push(parse_record(&record)?);
    }

    Ok(records)
}

/// Loads `name,measurement_unit` rows into the ingredient catalog.
///
/// Only catalog managers may import. The whole input is parsed before anything
/// is written, so a malformed row leaves the catalog untouched. Rows are
/// upserted by (name, measurement_unit) which makes re-importing the same file
/// a no-op. Returns the number of rows read.
pub async fn import_ingredients<R, S>(
    reader: R,
    store: &S,
    session: Option<&SessionData>,
) -> Result<usize, ServiceError>
where
    R: Read,
    S: CatalogRepository + ?Sized,
{
    let session = SessionData::require(session)?;
    session.authenticate(ActionType::ManageCatalog)?;

    let records = read_records(reader)?;

    for record in &records {
        store
            .upsert_ingredient(&record.name, &record.measurement_unit)
            .await?;
    }

    log::info!(
        "User {} imported {} ingredients",
        session.user_id,
        records.len()
    );

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStore, schema::UserRole};

    const CATALOG: &str = "абрикосовое варенье,г\n\
                           flour, g\n\
                           \n\
                           egg,pcs\n";

    async fn session(store: &MemoryStore, role: UserRole) -> SessionData {
        let user = store.add_user("importer", role).await;
        SessionData {
            user_id: user.id,
            username: user.username,
            is_admin: user.role == UserRole::Admin,
            role: user.role,
        }
    }

    #[tokio::test]
    async fn imports_rows_into_catalog() {
        let store = MemoryStore::new();
        let admin = session(&store, UserRole::Admin).await;

        let count = import_ingredients(CATALOG.as_bytes(), &store, Some(&admin))
            .await
            .unwrap();
        assert_eq!(count, 3);

        let found = store.search_ingredients("fl").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "flour");
        assert_eq!(found[0].measurement_unit, "g");

        let found = store.search_ingredients("абрикос").await.unwrap();
        assert_eq!(found[0].measurement_unit, "г");
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let store = MemoryStore::new();
        let admin = session(&store, UserRole::Admin).await;

        import_ingredients(CATALOG.as_bytes(), &store, Some(&admin))
            .await
            .unwrap();
        let before = store.search_ingredients("").await.unwrap();

        import_ingredients(CATALOG.as_bytes(), &store, Some(&admin))
            .await
            .unwrap();
        let after = store.search_ingredients("").await.unwrap();

        assert_eq!(before, after);
        assert_eq!(after.len(), 3);
    }

    #[tokio::test]
    async fn malformed_rows_abort_before_writing() {
        let store = MemoryStore::new();
        let admin = session(&store, UserRole::Admin).await;

        let err = import_ingredients("salt,g\npepper\n".as_bytes(), &store, Some(&admin))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Validation(ValidationError::InvalidRecord {
                line: 2,
                reason: String::from("expected name and measurement unit"),
            })
        );

        let err = import_ingredients("salt,\n".as_bytes(), &store, Some(&admin))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let long_name = format!("salt,g\n{},g\n", "x".repeat(INGREDIENT_NAME_MAX_LENGTH + 1));
        let err = import_ingredients(long_name.as_bytes(), &store, Some(&admin))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Validation(ValidationError::InvalidRecord {
                line: 2,
                reason: String::from("name is too long"),
            })
        );

        let long_unit = format!("salt,{}\n", "g".repeat(MEASUREMENT_UNIT_MAX_LENGTH + 1));
        let err = import_ingredients(long_unit.as_bytes(), &store, Some(&admin))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert!(store.search_ingredients("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_catalog_managers_import() {
        let store = MemoryStore::new();
        let user = session(&store, UserRole::User).await;

        let err = import_ingredients(CATALOG.as_bytes(), &store, Some(&user))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);

        let err = import_ingredients(CATALOG.as_bytes(), &store, None)
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::NotAuthenticated);

        assert!(store.search_ingredients("").await.unwrap().is_empty());
    }
}
