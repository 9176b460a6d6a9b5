use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::contract::{Application, ApplicationSummary, DaoService, Instance};

#[derive(Default)]
struct Tables {
    applications: BTreeMap<u32, Application>,
    instances: BTreeMap<u32, Instance>,
}

/// In-memory storage for applications and instances
#[derive(Default)]
pub struct MemoryDao {
    tables: RwLock<Tables>,
}

impl MemoryDao {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update an application
    pub fn upsert_application(&self, application: Application) {
        self.tables
            .write()
            .applications
            .insert(application.application_id, application);
    }

    /// Register or update an instance
    pub fn upsert_instance(&self, instance: Instance) {
        self.tables
            .write()
            .instances
            .insert(instance.instance_id, instance);
    }
}

impl DaoService for MemoryDao {
    fn applications(
        &self,
        start_time: i64,
        end_time: i64,
    ) -> anyhow::Result<Vec<ApplicationSummary>> {
        let tables = self.tables.read();
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for instance in tables.instances.values() {
            if (start_time..=end_time).contains(&instance.heartbeat_time) {
                *counts.entry(instance.application_id).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .filter_map(|(application_id, instance_count)| {
                tables
                    .applications
                    .get(&application_id)
                    .map(|app| ApplicationSummary {
                        application_id,
                        application_code: app.application_code.clone(),
                        instance_count,
                    })
            })
            .collect())
    }

    fn instance(&self, instance_id: u32) -> anyhow::Result<Option<Instance>> {
        Ok(self.tables.read().instances.get(&instance_id).cloned())
    }

    fn last_heartbeat_time(&self) -> anyhow::Result<Option<i64>> {
        Ok(self
            .tables
            .read()
            .instances
            .values()
            .map(|i| i.heartbeat_time)
            .max())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn seeded() -> MemoryDao {
        let dao = MemoryDao::new();
        dao.upsert_application(Application {
            application_id: 2,
            application_code: "portal".to_owned(),
        });
        dao.upsert_application(Application {
            application_id: 3,
            application_code: "billing".to_owned(),
        });
        for (instance_id, application_id, heartbeat_time) in [(1, 2, 100), (2, 2, 150), (3, 3, 900)] {
            dao.upsert_instance(Instance {
                instance_id,
                application_id,
                register_time: 0,
                heartbeat_time,
                os_info: None,
            });
        }
        dao
    }

    #[test]
    fn applications_count_live_instances_in_window() {
        let dao = seeded();
        let apps = dao.applications(0, 200).unwrap();
        assert_eq!(
            apps,
            vec![ApplicationSummary {
                application_id: 2,
                application_code: "portal".to_owned(),
                instance_count: 2,
            }]
        );
        assert_eq!(dao.applications(0, 1000).unwrap().len(), 2);
    }

    #[test]
    fn empty_store_has_no_last_time() {
        assert_eq!(MemoryDao::new().last_heartbeat_time().unwrap(), None);
    }
}
