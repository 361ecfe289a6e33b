//! # Testcase Matrix Unit Tests / 测试矩阵单元测试
//!
//! Runnable filtering, compiler × mode expansion and directory bookkeeping.
//!
//! 可运行过滤、编译器 × 模式展开以及目录记录。

mod common;

use assert_runner::core::config::TestCaseSpec;
use assert_runner::core::matrix::{axis_values, TestcaseMatrix};
use common::{entries, spec};
use tempfile::tempdir;

const TS: &str = "20240101_120000";

#[cfg(test)]
mod runnable_tests {
    use super::*;

    #[test]
    fn test_only_explicitly_enabled_specs_run_in_order() {
        let specs = vec![
            spec("A", Some(true), &["intel"], &["serial"]),
            spec("B", None, &["intel"], &["serial"]),
            spec("C", Some(false), &["intel"], &["serial"]),
            spec("D", Some(true), &["intel"], &["serial"]),
        ];
        let matrix = TestcaseMatrix::new(specs, "/unused");

        assert_eq!(matrix.runnable_names(), vec!["A", "D"]);
        assert_eq!(matrix.testcase_names(), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_is_runnable_requires_true() {
        let mut spec = TestCaseSpec::named("x");
        assert!(!TestcaseMatrix::is_runnable(&spec));
        spec.run = Some(false);
        assert!(!TestcaseMatrix::is_runnable(&spec));
        spec.run = Some(true);
        assert!(TestcaseMatrix::is_runnable(&spec));
    }

    #[test]
    fn test_lookup_finds_non_runnable_specs() {
        let matrix = TestcaseMatrix::new(vec![spec("B", None, &[], &[])], "/unused");
        assert!(matrix.lookup("B").is_some());
        assert!(matrix.lookup("Z").is_none());
        assert!(matrix.runnable().is_empty());
    }
}

#[cfg(test)]
mod build_tests {
    use super::*;

    #[test]
    fn test_two_compilers_three_modes_give_six_directories() {
        let scratch = tempdir().unwrap();
        let mut matrix = TestcaseMatrix::new(
            vec![spec("E1M20", Some(true), &["intel", "gfortran"], &["serial", "mpi", "openmp"])],
            scratch.path(),
        );

        let created = matrix.build_matrix(TS).unwrap();
        assert_eq!(created, 6);

        let test_dir = matrix.test_dir("E1M20", TS);
        assert_eq!(
            entries(&test_dir),
            vec![
                "gfortran-mpi",
                "gfortran-openmp",
                "gfortran-serial",
                "intel-mpi",
                "intel-openmp",
                "intel-serial",
            ]
        );
        for combination in matrix.combinations() {
            assert!(combination.code_dir().is_dir());
            assert!(combination.run_dir().is_dir());
        }
    }

    #[test]
    fn test_combinations_follow_compiler_then_mode_order() {
        let scratch = tempdir().unwrap();
        let mut matrix = TestcaseMatrix::new(
            vec![spec("E1M20", Some(true), &["intel", "gfortran"], &["serial", "mpi"])],
            scratch.path(),
        );
        matrix.build_matrix(TS).unwrap();

        let labels: Vec<_> = matrix.combinations().iter().map(|c| c.label()).collect();
        assert_eq!(
            labels,
            vec![
                "E1M20/intel-serial",
                "E1M20/intel-mpi",
                "E1M20/gfortran-serial",
                "E1M20/gfortran-mpi",
            ]
        );
    }

    #[test]
    fn test_test_directory_carries_timestamp() {
        let scratch = tempdir().unwrap();
        let matrix = TestcaseMatrix::new(vec![], scratch.path());
        assert_eq!(
            matrix.test_dir("E1M20", TS),
            scratch.path().join("E1M20_20240101_120000")
        );
    }

    #[test]
    fn test_single_string_axis_is_one_value() {
        let scratch = tempdir().unwrap();
        let mut spec = TestCaseSpec::named("SCM");
        spec.run = Some(true);
        spec.compilers = Some(toml::Value::String("gfortran".into()));
        spec.modes = Some(toml::Value::String("serial".into()));
        let mut matrix = TestcaseMatrix::new(vec![spec], scratch.path());

        assert_eq!(matrix.build_matrix(TS).unwrap(), 1);
        assert!(matrix.combinations()[0].dir.ends_with("gfortran-serial"));
    }

    #[test]
    fn test_malformed_axis_yields_no_combinations() {
        let scratch = tempdir().unwrap();
        let mut bad = TestCaseSpec::named("bad");
        bad.run = Some(true);
        bad.compilers = Some(toml::Value::Integer(3));
        bad.modes = Some(toml::Value::String("serial".into()));
        let good = spec("good", Some(true), &["intel"], &["mpi"]);
        let mut matrix = TestcaseMatrix::new(vec![bad, good], scratch.path());

        assert_eq!(matrix.build_matrix(TS).unwrap(), 1);
        let directories = matrix.get_directories();
        assert!(directories["bad"].is_empty());
        assert_eq!(directories["good"].len(), 1);
    }

    #[test]
    fn test_empty_axis_is_not_an_error() {
        let scratch = tempdir().unwrap();
        let mut matrix = TestcaseMatrix::new(
            vec![spec("nomodes", Some(true), &["intel"], &[])],
            scratch.path(),
        );
        assert_eq!(matrix.build_matrix(TS).unwrap(), 0);
        assert!(matrix.combinations_for("nomodes").is_empty());
    }

    #[test]
    fn test_axis_values_shapes() {
        assert_eq!(axis_values(None), None);
        assert_eq!(
            axis_values(Some(&toml::Value::String("intel".into()))),
            Some(vec!["intel".to_string()])
        );
        let mixed = toml::Value::Array(vec![toml::Value::String("intel".into()), toml::Value::Integer(1)]);
        assert_eq!(axis_values(Some(&mixed)), None);
    }

    #[test]
    fn test_repeated_axis_values_collapse() {
        let repeated = toml::Value::Array(
            ["intel", "gfortran", "intel"]
                .iter()
                .map(|c| toml::Value::String(c.to_string()))
                .collect(),
        );
        assert_eq!(
            axis_values(Some(&repeated)),
            Some(vec!["intel".to_string(), "gfortran".to_string()])
        );

        let scratch = tempdir().unwrap();
        let mut matrix = TestcaseMatrix::new(
            vec![spec("E1M20", Some(true), &["intel", "intel"], &["serial", "serial"])],
            scratch.path(),
        );
        assert_eq!(matrix.build_matrix(TS).unwrap(), 1);
        assert_eq!(matrix.combinations_for("E1M20")[0].label(), "E1M20/intel-serial");
    }
}

#[cfg(test)]
mod directory_tests {
    use super::*;

    #[test]
    fn test_get_directories_before_build_is_empty() {
        let matrix = TestcaseMatrix::new(vec![spec("A", Some(true), &["intel"], &["serial"])], "/unused");
        assert!(!matrix.is_built());
        assert!(matrix.get_directories().is_empty());
        assert!(matrix.combinations().is_empty());
    }

    #[test]
    fn test_clear_test_removes_directories_but_keeps_index() {
        let scratch = tempdir().unwrap();
        let mut matrix = TestcaseMatrix::new(
            vec![
                spec("A", Some(true), &["intel"], &["serial", "mpi"]),
                spec("B", Some(true), &["intel"], &["serial"]),
            ],
            scratch.path(),
        );
        matrix.build_matrix(TS).unwrap();

        matrix.clear_test("A").unwrap();

        for combination in matrix.combinations_for("A") {
            assert!(!combination.dir.exists());
        }
        assert_eq!(matrix.get_directories()["A"].len(), 2);
        assert!(matrix.combinations_for("B")[0].dir.exists());
    }

    #[test]
    fn test_clear_unknown_test_is_noop() {
        let scratch = tempdir().unwrap();
        let mut matrix = TestcaseMatrix::new(vec![], scratch.path());
        matrix.build_matrix(TS).unwrap();
        assert!(matrix.clear_test("ghost").is_ok());
    }
}

#[cfg(test)]
mod reset_tests {
    use assert_runner::infra::fs::reset_dir;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_reset_empties_and_recreates() {
        let dir = tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir_all(scratch.join("modelE/E1M20_old")).unwrap();
        std::fs::write(scratch.join("stale.txt"), "x").unwrap();

        reset_dir(&scratch).unwrap();
        assert!(scratch.is_dir());
        assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);

        let fresh = dir.path().join("fresh");
        reset_dir(&fresh).unwrap();
        assert!(fresh.is_dir());
    }

    #[test]
    fn test_working_directory_is_refused() {
        let cwd = std::env::current_dir().unwrap();
        let before = std::fs::read_dir(&cwd).unwrap().count();

        assert!(reset_dir(Path::new(".")).is_err());
        assert!(reset_dir(&cwd).is_err());
        assert!(reset_dir(Path::new("")).is_err());
        assert!(reset_dir(Path::new("/")).is_err());

        assert_eq!(std::fs::read_dir(&cwd).unwrap().count(), before);
    }
}
