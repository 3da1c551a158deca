use std::collections::HashMap;

use starter_resources::{cpu_to_str, ram_to_str};

use crate::trait_def::CreatePodRequest;

/// `bondifuzz/<key>` label convention: hyphenated on the wire, underscored
/// in code.
pub fn bondifuzz_key(key: &str) -> String {
    format!("bondifuzz/{}", key.replace('_', "-"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceQuantities {
    pub cpu_m: i64,
    pub ram_mi: i64,
}

impl ResourceQuantities {
    pub fn to_wire(self) -> (String, String) {
        (cpu_to_str(self.cpu_m), ram_to_str(self.ram_mi))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceRequirements {
    pub requests: ResourceQuantities,
    pub limits: ResourceQuantities,
}

#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub env: Vec<EnvVar>,
    pub resources: ResourceRequirements,
}

impl ContainerSpec {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            image: String::new(),
            command: None,
            env: Vec::new(),
            resources: ResourceRequirements::default(),
        }
    }

    /// Upsert by name, matching the template's `_set_env` semantics: update
    /// in place if present, append otherwise.
    pub fn set_env(&mut self, name: &str, value: &str) {
        if let Some(existing) = self.env.iter_mut().find(|e| e.name == name) {
            existing.value = value.to_string();
        } else {
            self.env.push(EnvVar {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn set_requests(&mut self, cpu_m: i64, ram_mi: i64) {
        self.resources.requests = ResourceQuantities { cpu_m, ram_mi };
    }

    pub fn set_limits(&mut self, cpu_m: i64, ram_mi: i64) {
        self.resources.limits = ResourceQuantities { cpu_m, ram_mi };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toleration {
    pub key: String,
    pub value: String,
    pub operator: String,
    pub effect: String,
}

/// A composed fuzzer pod spec, ready to hand to an [`crate::Orchestrator`].
///
/// Holds direct fields for its two containers and its one tmpfs volume
/// rather than a dynamic path into a loaded template: every mutation is a
/// plain field/method access instead of a dict-key lookup, so an unknown
/// key is a compile error instead of a runtime `SpecParseError`.
#[derive(Debug, Clone)]
pub struct PodTemplate {
    pub labels: HashMap<String, String>,
    pub node_selector: HashMap<String, String>,
    pub tolerations: Vec<Toleration>,
    pub tmpfs_size_mi: i64,
    pub agent: ContainerSpec,
    pub sandbox: ContainerSpec,
    pub grace_period_seconds: Option<i64>,
    pub deadline_seconds: Option<i64>,
}

/// Builds a [`PodTemplate`] the way `AgentSpecTemplate`/`AgentSpec` compose
/// a pod spec, minus the YAML template load: the starting shape is a plain
/// Rust literal instead of a parsed file, since there is nothing left to
/// validate once the containers are typed fields.
pub struct PodSpecBuilder {
    template: PodTemplate,
}

impl PodSpecBuilder {
    pub fn new() -> Self {
        Self {
            template: PodTemplate {
                labels: HashMap::new(),
                node_selector: HashMap::new(),
                tolerations: Vec::new(),
                tmpfs_size_mi: 0,
                agent: ContainerSpec::new("agent"),
                sandbox: ContainerSpec::new("sandbox"),
                grace_period_seconds: None,
                deadline_seconds: None,
            },
        }
    }

    pub fn set_label(mut self, key: &str, value: &str) -> Self {
        self.template.labels.insert(bondifuzz_key(key), value.to_string());
        self
    }

    pub fn set_node_selector(mut self, key: &str, value: &str) -> Self {
        self.template.node_selector.insert(bondifuzz_key(key), value.to_string());
        self
    }

    /// Upsert by key, matching `AgentSpec::set_toleration`.
    pub fn set_toleration(mut self, key: &str, value: &str, operator: &str, effect: &str) -> Self {
        let full_key = bondifuzz_key(key);
        if let Some(existing) = self.template.tolerations.iter_mut().find(|t| t.key == full_key) {
            existing.value = value.to_string();
            existing.operator = operator.to_string();
            existing.effect = effect.to_string();
        } else {
            self.template.tolerations.push(Toleration {
                key: full_key,
                value: value.to_string(),
                operator: operator.to_string(),
                effect: effect.to_string(),
            });
        }
        self
    }

    pub fn set_tmpfs_size_mi(mut self, size_mi: i64) -> Self {
        self.template.tmpfs_size_mi = size_mi;
        self
    }

    pub fn set_grace_period(mut self, seconds: i64) -> Self {
        self.template.grace_period_seconds = Some(seconds);
        self
    }

    pub fn set_deadline(mut self, seconds: i64) -> Self {
        self.template.deadline_seconds = Some(seconds);
        self
    }

    pub fn agent_mut(&mut self) -> &mut ContainerSpec {
        &mut self.template.agent
    }

    pub fn sandbox_mut(&mut self) -> &mut ContainerSpec {
        &mut self.template.sandbox
    }

    pub fn build(self) -> PodTemplate {
        self.template
    }
}

impl Default for PodSpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes the pod template for one fuzzer launch: node selector and
/// toleration pin the pod to its pool's nodes, the suitcase rides along as
/// `bondifuzz/*` labels, and the agent container gets the env vars it needs
/// to report back to the scheduler.
pub fn build_fuzzer_pod_template(req: &CreatePodRequest) -> PodTemplate {
    let mut builder = PodSpecBuilder::new()
        .set_label("user_id", &req.user_id)
        .set_label("project_id", &req.project_id)
        .set_label("pool_id", &req.pool_id)
        .set_label("fuzzer_id", &req.fuzzer_id)
        .set_label("fuzzer_rev", &req.fuzzer_rev)
        .set_label("agent_mode", &req.agent_mode)
        .set_label("fuzzer_lang", &req.fuzzer_lang)
        .set_label("fuzzer_engine", &req.fuzzer_engine)
        .set_label("session_id", &req.session_id)
        .set_node_selector("pool_id", &req.pool_id)
        .set_toleration("pool_id", &req.pool_id, "Equal", "NoSchedule")
        .set_tmpfs_size_mi(req.tmpfs_size_mi);

    {
        let agent = builder.agent_mut();
        agent.image = req.agent_image.clone();
        agent.set_requests(req.agent_cpu_m, req.agent_ram_mi);
        agent.set_limits(req.agent_cpu_m, req.agent_ram_mi);
        for (name, value) in [
            ("FUZZER_ID", req.fuzzer_id.as_str()),
            ("FUZZER_REV", req.fuzzer_rev.as_str()),
            ("FUZZER_ENGINE", req.fuzzer_engine.as_str()),
            ("FUZZER_LANG", req.fuzzer_lang.as_str()),
            ("POOL_ID", req.pool_id.as_str()),
            ("USER_ID", req.user_id.as_str()),
            ("PROJECT_ID", req.project_id.as_str()),
            ("SESSION_ID", req.session_id.as_str()),
            ("AGENT_MODE", req.agent_mode.as_str()),
            ("SANDBOX_IMAGE", req.sandbox_image.as_str()),
        ] {
            agent.set_env(name, value);
        }
    }

    {
        let sandbox = builder.sandbox_mut();
        sandbox.image = req.sandbox_image.clone();
        sandbox.set_requests(req.sandbox_cpu_m, req.sandbox_ram_mi);
        sandbox.set_limits(req.sandbox_cpu_m, req.sandbox_ram_mi);
    }

    builder.build()
}
