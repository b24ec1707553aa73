//! Argo CD promotion mechanism
//!
//! Promotes Freight by pointing Argo CD Application sources at the Freight's
//! commits, chart versions and image tags, then asking Argo CD to hard
//! refresh and sync. Every Application must explicitly opt in to being
//! mutated by a Stage through the [`AUTHORIZED_STAGE_ANNOTATION_KEY`]
//! annotation.

use super::{EngineSettings, Mechanism};
use crate::argocd::ApplicationStore;
use crate::error::{PromoteError, PromoteResult, PromotionError, PromotionResult};
use crate::models::application::{ANNOTATION_KEY_REFRESH, Info, REFRESH_TYPE_HARD};
use crate::models::{
    Application, ApplicationSource, ApplicationSourceHelm, ApplicationSourceKustomize,
    ArgoCDAppUpdate, ArgoCDHelmImageUpdate, ArgoCDSourceUpdate, Freight, HelmParameter,
    ImageUpdateValueType, Operation, OperationInitiator, Stage, SyncOperation,
};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use std::sync::Arc;

/// Annotation through which an Application grants a Stage permission to
/// mutate it. Format: `<namespace glob>:<name glob>`.
pub const AUTHORIZED_STAGE_ANNOTATION_KEY: &str = "kargo.akuity.io/authorized-stage";

const SYNC_REASON: &str = "Promotion triggered a sync of this Application resource.";

/// Transforms one Application source according to one source update
pub type ApplySourceUpdateFn =
    fn(ApplicationSource, &Freight, &ArgoCDSourceUpdate) -> PromotionResult<ApplicationSource>;

/// [`Mechanism`] that updates Argo CD Applications
pub struct ArgoCDMechanism {
    store: Arc<dyn ApplicationStore>,
    settings: EngineSettings,
    apply_source_update_fn: ApplySourceUpdateFn,
}

impl ArgoCDMechanism {
    pub fn new(store: Arc<dyn ApplicationStore>, settings: EngineSettings) -> Self {
        Self::with_source_update_fn(store, settings, apply_argocd_source_update)
    }

    /// Build a mechanism with a replacement source transformation
    pub fn with_source_update_fn(
        store: Arc<dyn ApplicationStore>,
        settings: EngineSettings,
        apply_source_update_fn: ApplySourceUpdateFn,
    ) -> Self {
        Self {
            store,
            settings,
            apply_source_update_fn,
        }
    }

    async fn do_single_update(
        &self,
        stage_meta: &ObjectMeta,
        update: &ArgoCDAppUpdate,
        freight: &Freight,
    ) -> PromotionResult<()> {
        let namespace = update.app_namespace_or(&self.settings.argocd_namespace);
        let name = update.app_name.as_str();

        let mut app = self
            .store
            .get(namespace, name)
            .await
            .map_err(|e| PromotionError::AppLookup {
                name: name.to_string(),
                namespace: namespace.to_string(),
                source: Box::new(e),
            })?
            .ok_or_else(|| PromotionError::AppNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;

        authorize_argocd_app_update(stage_meta, &app.metadata)?;

        for src_update in &update.source_updates {
            if let Some(source) = app.spec.source.take() {
                let source = (self.apply_source_update_fn)(source, freight, src_update)
                    .map_err(|e| source_update_error(name, namespace, e))?;
                app.spec.source = Some(source);
            }
            let sources = std::mem::take(&mut app.spec.sources);
            app.spec.sources = sources
                .into_iter()
                .map(|source| (self.apply_source_update_fn)(source, freight, src_update))
                .collect::<PromotionResult<Vec<_>>>()
                .map_err(|e| source_update_error(name, namespace, e))?;
        }

        request_sync(&mut app, &self.settings.sync_initiator);

        self.store
            .patch(namespace, name, build_app_patch(&app)?)
            .await
            .map_err(|e| PromotionError::Patch {
                name: name.to_string(),
                source: Box::new(e),
            })?;

        tracing::debug!(app = name, namespace, "patched Argo CD Application");
        Ok(())
    }
}

fn source_update_error(name: &str, namespace: &str, err: PromotionError) -> PromotionError {
    PromotionError::SourceUpdate {
        name: name.to_string(),
        namespace: namespace.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl Mechanism for ArgoCDMechanism {
    fn name(&self) -> &str {
        "Argo CD promotion mechanism"
    }

    async fn promote(&self, stage: &Stage, freight: Freight) -> PromoteResult {
        let updates = &stage.spec.promotion_mechanisms.argocd_app_updates;
        if updates.is_empty() {
            return Ok(freight);
        }

        tracing::debug!("executing Argo CD-based promotion mechanisms");

        for update in updates {
            if let Err(source) = self.do_single_update(&stage.metadata, update, &freight).await {
                return Err(PromoteError {
                    mechanism: self.name().to_string(),
                    freight,
                    source,
                });
            }
        }

        tracing::debug!("done executing Argo CD-based promotion mechanisms");
        Ok(freight)
    }
}

/// Check that the Application described by `app_meta` permits mutation by
/// the Stage described by `stage_meta`
pub fn authorize_argocd_app_update(
    stage_meta: &ObjectMeta,
    app_meta: &ObjectMeta,
) -> PromotionResult<()> {
    let app = app_meta.name.clone().unwrap_or_default();
    let app_namespace = app_meta.namespace.clone().unwrap_or_default();
    let stage = stage_meta.name.as_deref().unwrap_or_default();
    let stage_namespace = stage_meta.namespace.as_deref().unwrap_or_default();

    let malformed = |reason: String| PromotionError::MalformedAuthorization {
        app: app.clone(),
        app_namespace: app_namespace.clone(),
        reason,
    };

    let Some(allowed) = app_meta
        .annotations
        .as_ref()
        .and_then(|a| a.get(AUTHORIZED_STAGE_ANNOTATION_KEY))
    else {
        return Err(PromotionError::Unauthorized {
            app: app.clone(),
            app_namespace: app_namespace.clone(),
            stage: stage.to_string(),
            stage_namespace: stage_namespace.to_string(),
        });
    };

    let tokens: Vec<&str> = allowed.split(':').collect();
    let [namespace_glob, name_glob] = tokens.as_slice() else {
        return Err(malformed(format!(
            "unable to parse value of annotation {:?} ({:?}); expected \"<namespace>:<name>\"",
            AUTHORIZED_STAGE_ANNOTATION_KEY, allowed
        )));
    };

    let compile = |token: &str| {
        glob::Pattern::new(&collapse_wildcards(token))
            .map_err(|e| malformed(format!("invalid glob expression {:?}: {}", token, e)))
    };
    let namespace_glob = compile(*namespace_glob)?;
    let name_glob = compile(*name_glob)?;

    if !namespace_glob.matches(stage_namespace) || !name_glob.matches(stage) {
        return Err(PromotionError::Unauthorized {
            app,
            app_namespace,
            stage: stage.to_string(),
            stage_namespace: stage_namespace.to_string(),
        });
    }
    Ok(())
}

/// Collapse runs of `*` into one
///
/// Names carry no path separators, so `**` means the same as `*` here. The
/// glob crate only accepts `**` as a whole path component.
fn collapse_wildcards(token: &str) -> String {
    let mut collapsed = String::with_capacity(token.len());
    for c in token.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed
}

/// Apply a single source update to an Application source
///
/// Sources whose `(repoURL, chart)` don't match the update are returned
/// untouched, as is anything the Freight has nothing to say about.
pub fn apply_argocd_source_update(
    mut source: ApplicationSource,
    freight: &Freight,
    update: &ArgoCDSourceUpdate,
) -> PromotionResult<ApplicationSource> {
    if source.repo_url != update.repo_url || source.chart != update.chart {
        return Ok(source);
    }

    if update.update_target_revision {
        if let Some(commit) = freight.commit_for(&source.repo_url) {
            source.target_revision = commit.id.clone();
        } else if let Some(chart) = freight.chart_for(&source.repo_url, &source.chart) {
            source.target_revision = chart.version.clone();
        }
    }

    if let Some(kustomize) = update.kustomize.as_ref().filter(|k| !k.images.is_empty()) {
        let overrides = build_kustomize_images(freight, &kustomize.images);
        if !overrides.is_empty() {
            let images = &mut source
                .kustomize
                .get_or_insert_with(ApplicationSourceKustomize::default)
                .images;
            for image in overrides {
                upsert_kustomize_image(images, image);
            }
        }
    }

    if let Some(helm) = update.helm.as_ref().filter(|h| !h.images.is_empty()) {
        let changes = build_helm_param_changes(freight, &helm.images);
        if !changes.is_empty() {
            let params = &mut source
                .helm
                .get_or_insert_with(ApplicationSourceHelm::default)
                .parameters;
            for (key, value) in changes {
                match params.iter_mut().find(|p| p.name == key) {
                    Some(param) => param.value = value,
                    None => params.push(HelmParameter {
                        name: key,
                        value,
                        force_string: false,
                    }),
                }
            }
        }
    }

    Ok(source)
}

/// Kustomize image overrides (`<image>=<image>:<tag>`) for the requested
/// images that the Freight carries
fn build_kustomize_images(freight: &Freight, requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter_map(|image| {
            freight
                .image_tag_for(image)
                .map(|tag| format!("{}={}:{}", image, image, tag))
        })
        .collect()
}

/// Name of the image a Kustomize image override applies to
fn kustomize_image_name(image: &str) -> &str {
    if let Some((name, _)) = image.split_once('=') {
        return name;
    }
    let image = image.split_once('@').map_or(image, |(name, _)| name);
    match image.rfind(':') {
        Some(i) if !image[i..].contains('/') => &image[..i],
        _ => image,
    }
}

fn upsert_kustomize_image(images: &mut Vec<String>, image: String) {
    let name = kustomize_image_name(&image).to_string();
    match images.iter_mut().find(|i| kustomize_image_name(i) == name) {
        Some(existing) => *existing = image,
        None => images.push(image),
    }
}

/// Ordered `(key, value)` Helm parameter changes for the requested images
/// that the Freight carries
fn build_helm_param_changes(
    freight: &Freight,
    requested: &[ArgoCDHelmImageUpdate],
) -> Vec<(String, String)> {
    let mut changes: Vec<(String, String)> = Vec::new();
    for image_update in requested {
        let value = match image_update.value {
            ImageUpdateValueType::Image | ImageUpdateValueType::Tag => {
                let Some(tag) = freight.image_tag_for(&image_update.image) else {
                    continue;
                };
                if image_update.value == ImageUpdateValueType::Image {
                    format!("{}:{}", image_update.image, tag)
                } else {
                    tag.to_string()
                }
            }
            // Shouldn't happen; ignore it
            ImageUpdateValueType::Unknown => continue,
        };
        match changes.iter_mut().find(|(k, _)| *k == image_update.key) {
            Some((_, v)) => *v = value,
            None => changes.push((image_update.key.clone(), value)),
        }
    }
    changes
}

/// Mark an Application for hard refresh and attach a sync operation for its
/// current source revisions
pub fn request_sync(app: &mut Application, initiator: &str) {
    app.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(
            ANNOTATION_KEY_REFRESH.to_string(),
            REFRESH_TYPE_HARD.to_string(),
        );

    let mut revisions: Vec<String> = Vec::with_capacity(app.spec.sources.len() + 1);
    if let Some(source) = &app.spec.source {
        revisions.push(source.target_revision.clone());
    }
    revisions.extend(app.spec.sources.iter().map(|s| s.target_revision.clone()));

    let mut operation = Operation {
        initiated_by: OperationInitiator {
            username: initiator.to_string(),
            automated: true,
        },
        info: vec![Info {
            name: "Reason".to_string(),
            value: SYNC_REASON.to_string(),
        }],
        sync: Some(SyncOperation {
            revisions,
            sync_options: None,
        }),
        retry: None,
    };
    if let Some(policy) = &app.spec.sync_policy {
        operation.retry = policy.retry.clone();
        if let Some(sync) = operation.sync.as_mut() {
            sync.sync_options = policy.sync_options.clone();
        }
    }
    app.operation = Some(operation);
}

/// JSON merge patch covering only the fields this mechanism owns
pub fn build_app_patch(app: &Application) -> PromotionResult<serde_json::Value> {
    let mut spec = serde_json::Map::new();
    if let Some(source) = &app.spec.source {
        spec.insert("source".to_string(), serde_json::to_value(source)?);
    }
    if !app.spec.sources.is_empty() {
        spec.insert("sources".to_string(), serde_json::to_value(&app.spec.sources)?);
    }

    let refresh = app
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_KEY_REFRESH))
        .cloned()
        .unwrap_or_else(|| REFRESH_TYPE_HARD.to_string());

    Ok(json!({
        "metadata": {
            "annotations": {
                ANNOTATION_KEY_REFRESH: refresh
            }
        },
        "spec": spec,
        "operation": app.operation,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::argocd::store::MockApplicationStore;
    use crate::models::application::SyncPolicy;
    use crate::models::{ArgoCDHelm, ArgoCDKustomize, Chart, GitCommit, Image, StageSpec};
    use crate::models::PromotionMechanisms;
    use std::collections::BTreeMap;

    fn stage_meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }

    fn app_meta(annotation: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some("guestbook".to_string()),
            namespace: Some("argocd".to_string()),
            annotations: annotation.map(|value| {
                BTreeMap::from([(
                    AUTHORIZED_STAGE_ANNOTATION_KEY.to_string(),
                    value.to_string(),
                )])
            }),
            ..Default::default()
        }
    }

    fn stage_with_updates(updates: Vec<ArgoCDAppUpdate>) -> Stage {
        let mut stage = Stage::new(
            "test",
            StageSpec {
                promotion_mechanisms: PromotionMechanisms {
                    argocd_app_updates: updates,
                    ..Default::default()
                },
            },
        );
        stage.metadata.namespace = Some("kargo-demo".to_string());
        stage
    }

    fn authorized_app(source: ApplicationSource) -> Application {
        Application {
            metadata: app_meta(Some("kargo-demo:test")),
            spec: crate::models::application::ApplicationSpec {
                source: Some(source),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn repo_source(repo: &str) -> ApplicationSource {
        ApplicationSource {
            repo_url: repo.to_string(),
            target_revision: "HEAD".to_string(),
            ..Default::default()
        }
    }

    fn freight() -> Freight {
        Freight {
            commits: vec![GitCommit {
                repo_url: "https://github.com/example/repo".to_string(),
                id: "fake-commit".to_string(),
                health_check_commit: String::new(),
            }],
            images: vec![Image {
                repo_url: "img".to_string(),
                tag: "v2".to_string(),
            }],
            charts: vec![Chart {
                registry_url: "https://charts.example.com".to_string(),
                name: "app".to_string(),
                version: "1.2.3".to_string(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_authorize_missing_annotation() {
        let err = authorize_argocd_app_update(&stage_meta("ns", "stage"), &app_meta(None))
            .unwrap_err();
        assert!(matches!(err, PromotionError::Unauthorized { .. }));
    }

    #[test]
    fn test_authorize_malformed_annotation() {
        for value in ["no-colon", "a:b:c"] {
            let err =
                authorize_argocd_app_update(&stage_meta("ns", "stage"), &app_meta(Some(value)))
                    .unwrap_err();
            assert!(
                matches!(err, PromotionError::MalformedAuthorization { .. }),
                "{} should be malformed",
                value
            );
            assert!(err.to_string().contains("unable to parse"));
        }
    }

    #[test]
    fn test_authorize_invalid_glob() {
        let err =
            authorize_argocd_app_update(&stage_meta("ns", "stage"), &app_meta(Some("ns:stage-[")))
                .unwrap_err();
        assert!(matches!(err, PromotionError::MalformedAuthorization { .. }));
        assert!(err.to_string().contains("invalid glob expression"));
        assert!(err.is_authorization());
    }

    #[test]
    fn test_authorize_mismatch() {
        let err = authorize_argocd_app_update(
            &stage_meta("ns", "stage"),
            &app_meta(Some("other-ns:stage")),
        )
        .unwrap_err();
        assert!(matches!(err, PromotionError::Unauthorized { .. }));

        let err = authorize_argocd_app_update(
            &stage_meta("ns", "stage"),
            &app_meta(Some("ns:other-stage")),
        )
        .unwrap_err();
        assert!(matches!(err, PromotionError::Unauthorized { .. }));
    }

    #[test]
    fn test_authorize_exact_and_wildcard_matches() {
        let meta = stage_meta("kargo-demo", "uat");
        assert!(authorize_argocd_app_update(&meta, &app_meta(Some("kargo-demo:uat"))).is_ok());
        assert!(authorize_argocd_app_update(&meta, &app_meta(Some("*:*"))).is_ok());
        assert!(authorize_argocd_app_update(&meta, &app_meta(Some("kargo-*:u?t"))).is_ok());
        assert!(authorize_argocd_app_update(&meta, &app_meta(Some("kargo-*:prod"))).is_err());
    }

    #[test]
    fn test_authorize_double_star_acts_as_single_star() {
        let meta = stage_meta("kargo-demo", "uat");
        assert!(authorize_argocd_app_update(&meta, &app_meta(Some("kargo-**:u*"))).is_ok());
        assert!(authorize_argocd_app_update(&meta, &app_meta(Some("**:***"))).is_ok());
        assert!(matches!(
            authorize_argocd_app_update(&meta, &app_meta(Some("kargo-**:prod"))).unwrap_err(),
            PromotionError::Unauthorized { .. }
        ));
    }

    #[test]
    fn test_collapse_wildcards() {
        assert_eq!(collapse_wildcards("kargo-**"), "kargo-*");
        assert_eq!(collapse_wildcards("a***b*c"), "a*b*c");
        assert_eq!(collapse_wildcards("u?t"), "u?t");
    }

    #[test]
    fn test_source_update_no_match_is_noop() {
        let source = ApplicationSource {
            repo_url: "https://github.com/example/other".to_string(),
            target_revision: "HEAD".to_string(),
            ..Default::default()
        };
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            update_target_revision: true,
            ..Default::default()
        };
        let updated = apply_argocd_source_update(source.clone(), &freight(), &update).unwrap();
        assert_eq!(updated, source);
    }

    #[test]
    fn test_source_update_chart_must_match() {
        let source = ApplicationSource {
            repo_url: "https://charts.example.com".to_string(),
            chart: "other".to_string(),
            target_revision: "0.1.0".to_string(),
            ..Default::default()
        };
        let update = ArgoCDSourceUpdate {
            repo_url: "https://charts.example.com".to_string(),
            chart: "app".to_string(),
            update_target_revision: true,
            ..Default::default()
        };
        let updated = apply_argocd_source_update(source.clone(), &freight(), &update).unwrap();
        assert_eq!(updated, source);
    }

    #[test]
    fn test_source_update_target_revision_from_commit() {
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            update_target_revision: true,
            ..Default::default()
        };
        let updated = apply_argocd_source_update(
            repo_source("https://github.com/example/repo"),
            &freight(),
            &update,
        )
        .unwrap();
        assert_eq!(updated.target_revision, "fake-commit");
    }

    #[test]
    fn test_source_update_target_revision_uses_commit_id_not_health_check_commit() {
        let mut freight = freight();
        freight.commits[0].health_check_commit = "rendered".to_string();
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            update_target_revision: true,
            ..Default::default()
        };
        let updated = apply_argocd_source_update(
            repo_source("https://github.com/example/repo"),
            &freight,
            &update,
        )
        .unwrap();
        assert_eq!(updated.target_revision, "fake-commit");
    }

    #[test]
    fn test_source_update_target_revision_from_chart() {
        let source = ApplicationSource {
            repo_url: "https://charts.example.com".to_string(),
            chart: "app".to_string(),
            target_revision: "0.1.0".to_string(),
            ..Default::default()
        };
        let update = ArgoCDSourceUpdate {
            repo_url: "https://charts.example.com".to_string(),
            chart: "app".to_string(),
            update_target_revision: true,
            ..Default::default()
        };
        let updated = apply_argocd_source_update(source, &freight(), &update).unwrap();
        assert_eq!(updated.target_revision, "1.2.3");
    }

    #[test]
    fn test_source_update_target_revision_unresolved_is_left_alone() {
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/unknown".to_string(),
            update_target_revision: true,
            ..Default::default()
        };
        let updated = apply_argocd_source_update(
            repo_source("https://github.com/example/unknown"),
            &freight(),
            &update,
        )
        .unwrap();
        assert_eq!(updated.target_revision, "HEAD");
    }

    #[test]
    fn test_source_update_kustomize_images() {
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            kustomize: Some(ArgoCDKustomize {
                images: vec!["img".to_string(), "other".to_string()],
            }),
            ..Default::default()
        };
        let updated = apply_argocd_source_update(
            repo_source("https://github.com/example/repo"),
            &freight(),
            &update,
        )
        .unwrap();
        assert_eq!(updated.kustomize.unwrap().images, vec!["img=img:v2"]);
    }

    #[test]
    fn test_source_update_kustomize_keeps_unrelated_overrides() {
        let mut source = repo_source("https://github.com/example/repo");
        source.kustomize = Some(ApplicationSourceKustomize {
            images: vec!["sidecar=sidecar:1.0".to_string(), "img:v1".to_string()],
            ..Default::default()
        });
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            kustomize: Some(ArgoCDKustomize {
                images: vec!["img".to_string()],
            }),
            ..Default::default()
        };
        let updated = apply_argocd_source_update(source, &freight(), &update).unwrap();
        assert_eq!(
            updated.kustomize.unwrap().images,
            vec!["sidecar=sidecar:1.0", "img=img:v2"]
        );
    }

    #[test]
    fn test_source_update_kustomize_without_matches_adds_nothing() {
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            kustomize: Some(ArgoCDKustomize {
                images: vec!["other".to_string()],
            }),
            ..Default::default()
        };
        let updated = apply_argocd_source_update(
            repo_source("https://github.com/example/repo"),
            &freight(),
            &update,
        )
        .unwrap();
        assert!(updated.kustomize.is_none());
    }

    #[test]
    fn test_source_update_helm_parameters_upsert() {
        let mut source = repo_source("https://github.com/example/repo");
        source.helm = Some(ApplicationSourceHelm {
            parameters: vec![
                HelmParameter {
                    name: "A".to_string(),
                    value: "1".to_string(),
                    force_string: false,
                },
                HelmParameter {
                    name: "B".to_string(),
                    value: "2".to_string(),
                    force_string: false,
                },
            ],
            ..Default::default()
        });
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            helm: Some(ArgoCDHelm {
                images: vec![
                    ArgoCDHelmImageUpdate {
                        image: "img".to_string(),
                        key: "B".to_string(),
                        value: ImageUpdateValueType::Tag,
                    },
                    ArgoCDHelmImageUpdate {
                        image: "img".to_string(),
                        key: "C".to_string(),
                        value: ImageUpdateValueType::Image,
                    },
                    ArgoCDHelmImageUpdate {
                        image: "missing".to_string(),
                        key: "D".to_string(),
                        value: ImageUpdateValueType::Tag,
                    },
                    ArgoCDHelmImageUpdate {
                        image: "img".to_string(),
                        key: "E".to_string(),
                        value: ImageUpdateValueType::Unknown,
                    },
                ],
            }),
            ..Default::default()
        };
        let updated = apply_argocd_source_update(source, &freight(), &update).unwrap();
        let params: Vec<(String, String)> = updated
            .helm
            .unwrap()
            .parameters
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect();
        assert_eq!(
            params,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "v2".to_string()),
                ("C".to_string(), "img:v2".to_string()),
            ]
        );
    }

    #[test]
    fn test_source_update_is_idempotent() {
        let update = ArgoCDSourceUpdate {
            repo_url: "https://github.com/example/repo".to_string(),
            update_target_revision: true,
            kustomize: Some(ArgoCDKustomize {
                images: vec!["img".to_string()],
            }),
            helm: Some(ArgoCDHelm {
                images: vec![ArgoCDHelmImageUpdate {
                    image: "img".to_string(),
                    key: "image.tag".to_string(),
                    value: ImageUpdateValueType::Tag,
                }],
            }),
            ..Default::default()
        };
        let once = apply_argocd_source_update(
            repo_source("https://github.com/example/repo"),
            &freight(),
            &update,
        )
        .unwrap();
        let twice = apply_argocd_source_update(once.clone(), &freight(), &update).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_kustomize_image_name() {
        assert_eq!(kustomize_image_name("img=img:v2"), "img");
        assert_eq!(kustomize_image_name("img:v1"), "img");
        assert_eq!(kustomize_image_name("img@sha256:abc"), "img");
        assert_eq!(kustomize_image_name("localhost:5000/img"), "localhost:5000/img");
        assert_eq!(kustomize_image_name("localhost:5000/img:v1"), "localhost:5000/img");
    }

    #[test]
    fn test_request_sync_revision_order_and_policy() {
        let mut app = authorized_app(repo_source("primary"));
        app.spec.source.as_mut().unwrap().target_revision = "p1".to_string();
        app.spec.sources = vec![
            ApplicationSource {
                repo_url: "a".to_string(),
                target_revision: "a1".to_string(),
                ..Default::default()
            },
            ApplicationSource {
                repo_url: "b".to_string(),
                target_revision: "b1".to_string(),
                ..Default::default()
            },
        ];
        app.spec.sync_policy = Some(SyncPolicy {
            retry: Some(json!({"limit": 5})),
            sync_options: Some(vec!["CreateNamespace=true".to_string()]),
            ..Default::default()
        });

        request_sync(&mut app, "kargo-controller");

        let annotations = app.metadata.annotations.as_ref().unwrap();
        assert_eq!(annotations.get(ANNOTATION_KEY_REFRESH).unwrap(), "hard");
        let op = app.operation.unwrap();
        assert_eq!(op.initiated_by.username, "kargo-controller");
        assert!(op.initiated_by.automated);
        assert_eq!(op.info[0].name, "Reason");
        assert_eq!(op.retry, Some(json!({"limit": 5})));
        let sync = op.sync.unwrap();
        assert_eq!(sync.revisions, vec!["p1", "a1", "b1"]);
        assert_eq!(sync.sync_options, Some(vec!["CreateNamespace=true".to_string()]));
    }

    #[test]
    fn test_build_app_patch_only_touches_owned_fields() {
        let mut app = authorized_app(repo_source("primary"));
        app.spec
            .extra
            .insert("project".to_string(), json!("default"));
        request_sync(&mut app, "kargo-controller");

        let patch = build_app_patch(&app).unwrap();
        assert_eq!(patch["metadata"]["annotations"][ANNOTATION_KEY_REFRESH], "hard");
        assert!(
            patch["metadata"]["annotations"]
                .get(AUTHORIZED_STAGE_ANNOTATION_KEY)
                .is_none()
        );
        assert_eq!(patch["spec"]["source"]["repoURL"], "primary");
        assert!(patch["spec"].get("project").is_none());
        assert!(patch["spec"].get("sources").is_none());
        assert_eq!(patch["operation"]["initiatedBy"]["username"], "kargo-controller");
    }

    #[tokio::test]
    async fn test_promote_without_updates_is_noop() {
        let mechanism = ArgoCDMechanism::new(
            Arc::new(MockApplicationStore::new()),
            EngineSettings::default(),
        );
        let stage = stage_with_updates(Vec::new());
        let result = mechanism.promote(&stage, freight()).await.unwrap();
        assert_eq!(result, freight());
    }

    #[tokio::test]
    async fn test_promote_app_not_found() {
        let mut store = MockApplicationStore::new();
        store.expect_get().times(1).returning(|_, _| Ok(None));
        store.expect_patch().never();

        let mechanism = ArgoCDMechanism::new(Arc::new(store), EngineSettings::default());
        let stage = stage_with_updates(vec![ArgoCDAppUpdate {
            app_name: "guestbook".to_string(),
            ..Default::default()
        }]);
        let err = mechanism.promote(&stage, freight()).await.unwrap_err();
        assert!(err.source.is_not_found());
        assert_eq!(err.freight, freight());
        assert!(err.to_string().contains("\"argocd\""));
    }

    #[tokio::test]
    async fn test_promote_lookup_error_stops_remaining_updates() {
        let mut store = MockApplicationStore::new();
        store.expect_get().times(1).returning(|_, _| {
            Err(PromotionError::AppNotFound {
                name: "x".to_string(),
                namespace: "y".to_string(),
            })
        });
        store.expect_patch().never();

        let mechanism = ArgoCDMechanism::new(Arc::new(store), EngineSettings::default());
        let stage = stage_with_updates(vec![
            ArgoCDAppUpdate {
                app_name: "first".to_string(),
                ..Default::default()
            },
            ArgoCDAppUpdate {
                app_name: "second".to_string(),
                ..Default::default()
            },
        ]);
        let err = mechanism.promote(&stage, freight()).await.unwrap_err();
        assert!(matches!(err.source, PromotionError::AppLookup { .. }));
    }

    #[tokio::test]
    async fn test_promote_unauthorized_leaves_app_unmutated() {
        let mut store = MockApplicationStore::new();
        store.expect_get().returning(|_, _| {
            let mut app = authorized_app(repo_source("https://github.com/example/repo"));
            app.metadata = app_meta(Some("kargo-demo:prod"));
            Ok(Some(app))
        });
        store.expect_patch().never();

        let mechanism = ArgoCDMechanism::new(Arc::new(store), EngineSettings::default());
        let stage = stage_with_updates(vec![ArgoCDAppUpdate {
            app_name: "guestbook".to_string(),
            ..Default::default()
        }]);
        let err = mechanism.promote(&stage, freight()).await.unwrap_err();
        assert!(err.source.is_authorization());
    }

    #[tokio::test]
    async fn test_promote_source_update_error() {
        let mut store = MockApplicationStore::new();
        store.expect_get().returning(|_, _| {
            Ok(Some(authorized_app(repo_source(
                "https://github.com/example/repo",
            ))))
        });
        store.expect_patch().never();

        let mechanism = ArgoCDMechanism::with_source_update_fn(
            Arc::new(store),
            EngineSettings::default(),
            |_, _, _| {
                Err(PromotionError::Render {
                    repo_url: "r".to_string(),
                    reason: "something went wrong".to_string(),
                })
            },
        );
        let stage = stage_with_updates(vec![ArgoCDAppUpdate {
            app_name: "guestbook".to_string(),
            source_updates: vec![ArgoCDSourceUpdate::default()],
            ..Default::default()
        }]);
        let err = mechanism.promote(&stage, freight()).await.unwrap_err();
        assert!(matches!(err.source, PromotionError::SourceUpdate { .. }));
        assert!(err.to_string().contains("something went wrong"));
    }

    #[tokio::test]
    async fn test_promote_patch_error() {
        let mut store = MockApplicationStore::new();
        store.expect_get().returning(|_, _| {
            Ok(Some(authorized_app(repo_source(
                "https://github.com/example/repo",
            ))))
        });
        store.expect_patch().times(1).returning(|_, _, _| {
            Err(PromotionError::AppNotFound {
                name: "guestbook".to_string(),
                namespace: "argocd".to_string(),
            })
        });

        let mechanism = ArgoCDMechanism::new(Arc::new(store), EngineSettings::default());
        let stage = stage_with_updates(vec![ArgoCDAppUpdate {
            app_name: "guestbook".to_string(),
            ..Default::default()
        }]);
        let err = mechanism.promote(&stage, freight()).await.unwrap_err();
        assert!(matches!(err.source, PromotionError::Patch { .. }));
        assert!(err.to_string().contains("error patching Argo CD Application \"guestbook\""));
    }

    #[tokio::test]
    async fn test_promote_success_patches_sources_and_operation() {
        let mut store = MockApplicationStore::new();
        store
            .expect_get()
            .withf(|namespace, name| namespace == "apps" && name == "guestbook")
            .returning(|_, _| {
                Ok(Some(authorized_app(repo_source(
                    "https://github.com/example/repo",
                ))))
            });
        store
            .expect_patch()
            .withf(|namespace, name, patch| {
                namespace == "apps"
                    && name == "guestbook"
                    && patch["spec"]["source"]["targetRevision"] == "fake-commit"
                    && patch["operation"]["sync"]["revisions"] == json!(["fake-commit"])
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mechanism = ArgoCDMechanism::new(Arc::new(store), EngineSettings::default());
        let stage = stage_with_updates(vec![ArgoCDAppUpdate {
            app_name: "guestbook".to_string(),
            app_namespace: "apps".to_string(),
            source_updates: vec![ArgoCDSourceUpdate {
                repo_url: "https://github.com/example/repo".to_string(),
                update_target_revision: true,
                ..Default::default()
            }],
        }]);
        let result = mechanism.promote(&stage, freight()).await.unwrap();
        assert_eq!(result, freight());
    }
}
