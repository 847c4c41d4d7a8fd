//! Argument builder tests
//!
//! Covers the fixed ordering of the ansible-playbook argument vector, vault
//! handling and extra variable encoding.

use playbook_bridge::args::{verbose_switch, PlaybookOptions, VaultOptions};
use playbook_bridge::Error;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn full_options() -> PlaybookOptions {
    let mut options = PlaybookOptions::new("site.yml")
        .with_inventory("/tmp/.inventory-abc.yml")
        .with_verbosity(2)
        .with_tag("web")
        .with_tag("db")
        .with_limit("web1")
        .with_limit("web2")
        .with_var_file("vars/common.yml")
        .with_vault(VaultOptions {
            files: vec!["vault/a.yml".into(), "vault/b.yml".into()],
            password_file: Some("pw.txt".into()),
            vault_id: Some("prod".into()),
        })
        .with_extra_var("user", "deploy")
        .with_extra_var("port", 8080)
        .with_extra_var("pkgs", json!(["nginx", "curl"]));
    options.name = Some("web1.example.com".into());
    options.force_handlers = true;
    options.check_mode = true;
    options.diff_mode = true;
    options
}

#[test]
fn test_full_argument_order() {
    let args = full_options().build_args().unwrap();
    assert_eq!(
        args,
        vec![
            "-vv",
            "--force-handlers",
            "-e",
            "hostname=web1.example.com",
            "--tags",
            "web,db",
            "--limit",
            "web1,web2",
            "--check",
            "--diff",
            "-e",
            "@vars/common.yml",
            "-e",
            "@vault/a.yml",
            "-e",
            "@vault/b.yml",
            "--vault-id",
            "prod@pw.txt",
            "-e",
            r#"{"pkgs":["nginx","curl"]}"#,
            "-e",
            r#"{"port":8080}"#,
            "-e",
            "user=deploy",
            "site.yml",
            "-i",
            "/tmp/.inventory-abc.yml",
        ]
    );
}

#[test]
fn test_playbook_and_inventory_come_last() {
    let args = full_options().build_args().unwrap();
    let n = args.len();
    assert_eq!(&args[n - 3..], &["site.yml", "-i", "/tmp/.inventory-abc.yml"]);
}

#[test]
fn test_vault_id_without_identity() {
    let options = PlaybookOptions::new("site.yml").with_vault(VaultOptions {
        files: vec!["secrets.yml".into()],
        password_file: Some("pw.txt".into()),
        vault_id: None,
    });
    let args = options.build_args().unwrap();
    assert_eq!(args, vec!["-e", "@secrets.yml", "--vault-id", "@pw.txt", "site.yml"]);

    // An empty identity is the same as none.
    let options = PlaybookOptions::new("site.yml").with_vault(VaultOptions {
        files: vec!["secrets.yml".into()],
        password_file: Some("pw.txt".into()),
        vault_id: Some(String::new()),
    });
    assert_eq!(options.build_args().unwrap()[3], "@pw.txt");
}

#[test]
fn test_vault_files_without_password_are_a_configuration_error() {
    let options = PlaybookOptions::new("site.yml").with_vault(VaultOptions {
        files: vec!["secrets.yml".into()],
        password_file: None,
        vault_id: Some("prod".into()),
    });
    let err = options.build_args().unwrap_err();
    assert!(matches!(err, Error::VaultPasswordMissing));
    assert!(err.is_configuration());
}

#[test]
fn test_extra_var_scalars_keep_their_type() {
    let args = PlaybookOptions::new("site.yml")
        .with_extra_var("enabled", true)
        .with_extra_var("ratio", 0.5)
        .with_extra_var("nothing", serde_json::Value::Null)
        .build_args()
        .unwrap();
    assert_eq!(
        args,
        vec![
            "-e",
            r#"{"enabled":true}"#,
            "-e",
            r#"{"nothing":null}"#,
            "-e",
            r#"{"ratio":0.5}"#,
            "site.yml",
        ]
    );
}

#[test]
fn test_string_value_with_equals_sign() {
    let args = PlaybookOptions::new("site.yml")
        .with_extra_var("opts", "a=b")
        .build_args()
        .unwrap();
    assert_eq!(args, vec!["-e", "opts=a=b", "site.yml"]);
}

#[test]
fn test_options_deserialize_with_defaults() {
    let options: PlaybookOptions = serde_json::from_value(json!({
        "playbook": "site.yml",
        "tags": ["a"],
        "extra_vars": {"x": 1}
    }))
    .unwrap();
    assert_eq!(options.verbosity, 0);
    assert_eq!(
        options.build_args().unwrap(),
        vec!["--tags", "a", "-e", r#"{"x":1}"#, "site.yml"]
    );
}

#[test]
fn test_verbose_switch_range() {
    assert_eq!(verbose_switch(0), None);
    assert_eq!(verbose_switch(6).as_deref(), Some("-vvvvvv"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the argument vector does not depend on insertion order
    #[test]
    fn extra_var_order_is_stable(
        vars in proptest::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{0,8}", 0..8)
    ) {
        let forward = vars
            .iter()
            .fold(PlaybookOptions::new("p.yml"), |o, (k, v)| o.with_extra_var(k.clone(), v.clone()));
        let backward = vars
            .iter()
            .rev()
            .fold(PlaybookOptions::new("p.yml"), |o, (k, v)| o.with_extra_var(k.clone(), v.clone()));

        let a = forward.build_args().unwrap();
        prop_assert_eq!(&a, &backward.build_args().unwrap());
        prop_assert_eq!(&a, &forward.build_args().unwrap());
        prop_assert_eq!(a.last().map(String::as_str), Some("p.yml"));
        prop_assert_eq!(a.len(), vars.len() * 2 + 1);
    }

    /// Property: any verbosity in range yields exactly that many `v`s
    #[test]
    fn verbosity_switch_length(level in 1u8..=6) {
        let args = PlaybookOptions::new("p.yml").with_verbosity(level).build_args().unwrap();
        prop_assert_eq!(args[0].len(), level as usize + 1);
    }
}
