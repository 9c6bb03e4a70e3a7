// Copyright (C) 2017 Hove and/or its affiliates.
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, version 3.

// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>

use super::{CollectionImporter, ImportSchema, RecordShape};
use crate::objects::Agency;
use serde::{Deserialize, Serialize};

/// Fields of an agency record
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct AgencyAttributes {
    pub acronym: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub internal_id: Option<String>,
    pub url: Option<String>,
    pub timezone: Option<String>,
    pub lang: Option<String>,
    pub phone: Option<String>,
    pub fare_url: Option<String>,
    pub email: Option<String>,
}

/// Agencies are plain records. Their lines are not part of them, a line
/// gives its agency.
pub struct AgencySchema;

impl ImportSchema for AgencySchema {
    type Attributes = AgencyAttributes;
    type Object = Agency;
    const SHAPE: RecordShape = RecordShape::Plain;

    fn new_object(id: String, attributes: AgencyAttributes) -> Agency {
        Agency {
            id,
            acronym: attributes.acronym,
            name: attributes.name,
            description: attributes.description,
            color: attributes.color,
            internal_id: attributes.internal_id,
            url: attributes.url,
            timezone: attributes.timezone,
            lang: attributes.lang,
            phone: attributes.phone,
            fare_url: attributes.fare_url,
            email: attributes.email,
        }
    }

    fn errors(agency: &Agency) -> Vec<String> {
        let mut errors = vec![];
        if agency
            .acronym
            .as_deref()
            .map_or(true, |acronym| acronym.trim().is_empty())
        {
            errors.push("Acronym is required".to_string());
        }
        errors
    }
}

/// Importer of agencies
pub type AgenciesImporter<'a> = CollectionImporter<'a, AgencySchema>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, Store};
    use pretty_assertions::assert_eq;

    const AGENCY_ID: &str = "5c6bf4b1-8d4f-4e8e-a36c-3f9a0f1b2c3d";

    #[test]
    fn import_agencies() {
        let store = InMemoryStore::new(vec![Agency {
            id: AGENCY_ID.to_string(),
            acronym: Some("OLD".to_string()),
            url: Some("https://old.example".to_string()),
            ..Default::default()
        }])
        .unwrap();
        let source = format!(
            r##"[
                {{"id": "{AGENCY_ID}", "acronym": "STM", "name": "Société de transport", "line_ids": ["l1"], "is_enabled": true}},
                {{"acronym": "RTL", "color": "#FF0000", "data": {{}}}}
            ]"##
        );
        let summary = AgenciesImporter::new(&store)
            .import(source.as_bytes())
            .unwrap();
        assert_eq!(1, summary.created);
        assert_eq!(1, summary.updated);

        let agencies = store.collection().unwrap();
        let updated = agencies.get(AGENCY_ID).unwrap();
        assert_eq!(Some("STM".to_string()), updated.acronym);
        assert_eq!(Some("Société de transport".to_string()), updated.name);
        // an update replaces the whole agency
        assert_eq!(None, updated.url);
        let created = agencies
            .values()
            .find(|agency| agency.id != AGENCY_ID)
            .unwrap();
        assert_eq!(Some("RTL".to_string()), created.acronym);
        assert_eq!(Some("#FF0000".to_string()), created.color);
    }

    #[test]
    fn acronym_is_required() {
        let store = InMemoryStore::<Agency>::default();
        let error = AgenciesImporter::new(&store)
            .import(r#"[{"name": "An agency"}]"#.as_bytes())
            .unwrap_err();
        assert_eq!(
            "Error validating data for object at position 0: Acronym is required",
            error.to_string()
        );
        assert!(store.collection().unwrap().is_empty());
    }
}
