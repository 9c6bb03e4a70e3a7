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
use crate::objects::{Date, Service};
use serde::{Deserialize, Serialize};

/// Fields of a service record, dates being formatted `YYYY-MM-DD`
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ServiceAttributes {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub internal_id: Option<String>,
    pub monday: Option<bool>,
    pub tuesday: Option<bool>,
    pub wednesday: Option<bool>,
    pub thursday: Option<bool>,
    pub friday: Option<bool>,
    pub saturday: Option<bool>,
    pub sunday: Option<bool>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub only_dates: Option<Vec<Date>>,
    pub except_dates: Option<Vec<Date>>,
}

/// Services are plain records
pub struct ServiceSchema;

impl ImportSchema for ServiceSchema {
    type Attributes = ServiceAttributes;
    type Object = Service;
    const SHAPE: RecordShape = RecordShape::Plain;

    fn new_object(id: String, attributes: ServiceAttributes) -> Service {
        Service {
            id,
            name: attributes.name,
            description: attributes.description,
            color: attributes.color,
            internal_id: attributes.internal_id,
            monday: attributes.monday.unwrap_or(false),
            tuesday: attributes.tuesday.unwrap_or(false),
            wednesday: attributes.wednesday.unwrap_or(false),
            thursday: attributes.thursday.unwrap_or(false),
            friday: attributes.friday.unwrap_or(false),
            saturday: attributes.saturday.unwrap_or(false),
            sunday: attributes.sunday.unwrap_or(false),
            start_date: attributes.start_date,
            end_date: attributes.end_date,
            only_dates: attributes.only_dates.unwrap_or_default(),
            except_dates: attributes.except_dates.unwrap_or_default(),
        }
    }

    fn errors(service: &Service) -> Vec<String> {
        let mut errors = vec![];
        if service
            .name
            .as_deref()
            .map_or(true, |name| name.trim().is_empty())
        {
            errors.push("Name is required".to_string());
        }
        if let (Some(start_date), Some(end_date)) = (service.start_date, service.end_date) {
            if start_date > end_date {
                errors.push("Start date is after end date".to_string());
            }
        }
        errors
    }
}

/// Importer of services
pub type ServicesImporter<'a> = CollectionImporter<'a, ServiceSchema>;
