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

//! Transport modes of lines and their GTFS route types.

use std::collections::HashMap;

/// What becomes of a line of a given mode in a GTFS feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GtfsRouteType {
    /// Exported with this `route_type`
    Export(u16),
    /// Not exported at all
    Omit,
}

lazy_static::lazy_static! {
    static ref MODES: HashMap<&'static str, GtfsRouteType> = {
        use GtfsRouteType::*;
        let mut m = HashMap::new();
        m.insert("bus", Export(3));
        m.insert("trolleybus", Export(11));
        m.insert("rail", Export(2));
        m.insert("highSpeedRail", Export(2));
        m.insert("metro", Export(1));
        m.insert("monorail", Export(12));
        m.insert("tram", Export(0));
        m.insert("tramTrain", Export(0));
        m.insert("water", Export(4));
        m.insert("gondola", Export(6));
        m.insert("funicular", Export(7));
        m.insert("taxi", Export(3));
        m.insert("cableCar", Export(5));
        m.insert("horse", Export(3));
        m.insert("other", Export(3));
        // transfer connections between lines, meaningless in GTFS
        m.insert("transferable", Omit);
        m
    };
}

/// GTFS route type of a mode, `None` for an unknown mode
pub fn gtfs_route_type(mode: &str) -> Option<GtfsRouteType> {
    MODES.get(mode).copied()
}

/// Whether the mode is a known line mode
pub fn is_known_mode(mode: &str) -> bool {
    MODES.contains_key(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn route_types() {
        assert_eq!(Some(GtfsRouteType::Export(3)), gtfs_route_type("bus"));
        assert_eq!(Some(GtfsRouteType::Export(1)), gtfs_route_type("metro"));
        assert_eq!(Some(GtfsRouteType::Export(0)), gtfs_route_type("tramTrain"));
        assert_eq!(Some(GtfsRouteType::Omit), gtfs_route_type("transferable"));
        assert_eq!(None, gtfs_route_type("hovercraft"));
        assert!(!is_known_mode("Bus"));
    }
}
