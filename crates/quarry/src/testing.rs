//
// testing.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use adit::broker::Broker;
use adit::config::BrokerConfig;

use crate::config::CoordinatorConfig;
use crate::index::Coordinator;
use crate::index::GlobalIndex;

/// A coordinator over default configuration. The broker client is created
/// but never connected: tests exercise the state machinery only.
pub(crate) fn test_coordinator() -> Coordinator {
    let broker = Broker::new(BrokerConfig::default()).unwrap();
    Coordinator::new(broker, CoordinatorConfig::default(), GlobalIndex::new())
}
