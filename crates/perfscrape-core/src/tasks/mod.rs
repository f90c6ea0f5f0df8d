//! Built-in collection tasks, one per snapshot subsystem.

pub mod cpu;
pub mod memory;
pub mod system;

use crate::task::CollectionTask;

/// All built-in task constructors. Each returns a boxed task.
pub fn all_tasks() -> Vec<Box<dyn CollectionTask>> {
    vec![
        Box::new(cpu::CpuTask),
        Box::new(memory::MemoryTask),
        Box::new(system::SystemTask),
    ]
}

/// Names of tasks enabled by the `[defaults]` placeholder.
pub fn default_task_names() -> Vec<&'static str> {
    all_tasks()
        .iter()
        .filter(|t| t.info().default_enabled)
        .map(|t| t.name())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn task_names_are_unique() {
        let tasks = all_tasks();
        let names: HashSet<_> = tasks.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), tasks.len());
    }

    #[test]
    fn every_task_declares_objects() {
        for task in all_tasks() {
            assert!(!task.required_objects().is_empty(), "{} declares no objects", task.name());
        }
    }

    #[test]
    fn defaults_cover_builtin_catalog() {
        assert_eq!(default_task_names(), vec!["cpu", "memory", "system"]);
    }
}
