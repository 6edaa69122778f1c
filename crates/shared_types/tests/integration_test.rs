use pyexec_shared_types::{BuildSpec, BuildSpecError, Dependency, DependencySet};

fn sample() -> BuildSpec {
    let mut spec = BuildSpec::from_python_version("3.8").unwrap();
    spec.add_apt_dependency("libpq-dev", Some("1.0".to_string())).unwrap();
    spec.add_apt_dependency("gcc", None).unwrap();
    spec.add_pip_dependency("psycopg2", None).unwrap();
    spec.add_pip_dependency("requests", Some("2.25.1".to_string())).unwrap();
    spec.set_copy_command("COPY . /mnt/projectdir", true).unwrap();
    spec.set_workdir_command("WORKDIR /mnt/projectdir", true).unwrap();
    spec.set_cmd_command(r#"CMD ["python", "-m", "app"]"#, true)
        .unwrap();
    spec
}

#[test]
fn serialized_specs_parse_back() {
    let spec = sample();
    let text = spec.to_dockerfile();
    assert_eq!(BuildSpec::parse(&text), Ok(spec.clone()));
    assert_eq!(text.parse::<BuildSpec>().unwrap().to_dockerfile(), text);
}

#[test]
fn apt_pip_is_the_only_lossy_line() {
    let mut spec = sample();
    spec.add_apt_dependency("python-pip", None).unwrap();
    let parsed = BuildSpec::parse(&spec.to_dockerfile()).unwrap();
    assert!(!parsed.apt_packages().contains("python-pip"));
    assert_eq!(parsed.apt_dependency_count() + 1, spec.apt_dependency_count());
}

#[test]
fn merging_one_spec_is_identity() {
    let spec = sample();
    assert_eq!(BuildSpec::merge(&[spec.clone()]), Ok(spec.clone()));
    assert_eq!(
        BuildSpec::merge(&[spec.clone(), spec.clone()]),
        Ok(spec)
    );
}

#[test]
fn disjoint_merges_commute_on_names() {
    let mut a = BuildSpec::from_python_version("3.8").unwrap();
    a.add_pip_dependency("numpy", None).unwrap();
    a.add_apt_dependency("gfortran", None).unwrap();
    let mut b = BuildSpec::from_python_version("3.8").unwrap();
    b.add_pip_dependency("flask", Some("1.1.2".to_string())).unwrap();

    let ab = BuildSpec::merge(&[a.clone(), b.clone()]).unwrap();
    let ba = BuildSpec::merge(&[b, a]).unwrap();
    let mut ab_names: Vec<&str> = ab.pip_packages().names().collect();
    let mut ba_names: Vec<&str> = ba.pip_packages().names().collect();
    ab_names.sort();
    ba_names.sort();
    assert_eq!(ab_names, ba_names);
    assert_eq!(ab.apt_dependency_count(), ba.apt_dependency_count());
}

#[test]
fn merge_fills_in_missing_versions() {
    let mut a = BuildSpec::from_python_version("3.8").unwrap();
    a.add_pip_dependency("requests", None).unwrap();
    let mut b = BuildSpec::from_python_version("3.8").unwrap();
    b.add_pip_dependency("requests", Some("2.25.1".to_string())).unwrap();

    for specs in [[a.clone(), b.clone()], [b, a]] {
        let merged = BuildSpec::merge(&specs).unwrap();
        assert_eq!(merged.pip_packages().version("requests"), Some("2.25.1"));
    }
}

#[test]
fn probe_style_output() {
    let text = "FROM python:3.8\nRUN [\"apt-get\", \"update\"]\nRUN [\"pip\",\"install\",\"six\"]\nCMD [\"python\", \"x.py\"]\n";
    let spec = BuildSpec::parse_dependencies_only(text).unwrap();
    let expected: DependencySet = vec![Dependency::new("six", None)].into();
    assert_eq!(spec.pip_packages(), &expected);
    assert_eq!(spec.cmd_command(), None);

    assert!(matches!(
        BuildSpec::parse("FROM python:3.8\nRUN [\"pip\",\"install\",\"six\"] # pinned\n"),
        Err(BuildSpecError::InvalidLine(_))
    ));
}
