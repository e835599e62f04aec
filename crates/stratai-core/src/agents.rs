//! The three fixed research roles.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::StratAiError;
use crate::tools::{SearchToolProvider, ToolSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    IndustryResearcher,
    UseCaseStrategist,
    ResourceCurator,
}

impl AgentKind {
    /// Execution order of the crew.
    pub const ALL: [AgentKind; 3] = [
        AgentKind::IndustryResearcher,
        AgentKind::UseCaseStrategist,
        AgentKind::ResourceCurator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::IndustryResearcher => "industry_researcher",
            AgentKind::UseCaseStrategist => "use_case_strategist",
            AgentKind::ResourceCurator => "resource_curator",
        }
    }
}

/// A named role with a goal, backstory and bound tools. Immutable once built.
#[derive(Clone)]
pub struct Agent {
    pub kind: AgentKind,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: ToolSet,
    pub allow_delegation: bool,
}

impl Agent {
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        )
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("kind", &self.kind)
            .field("role", &self.role)
            .field("tools", &self.tools)
            .field("allow_delegation", &self.allow_delegation)
            .finish()
    }
}

/// The researcher, strategist and curator of one run.
#[derive(Debug, Clone)]
pub struct AgentRoster {
    pub researcher: Arc<Agent>,
    pub strategist: Arc<Agent>,
    pub curator: Arc<Agent>,
}

impl AgentRoster {
    /// Agents in execution order.
    pub fn agents(&self) -> [&Arc<Agent>; 3] {
        [&self.researcher, &self.strategist, &self.curator]
    }

    pub fn by_role(&self, role: &str) -> Option<&Arc<Agent>> {
        let wanted = role.trim();
        self.agents()
            .into_iter()
            .find(|agent| agent.role.eq_ignore_ascii_case(wanted))
    }
}

pub struct AgentFactory<'a> {
    tools: &'a SearchToolProvider,
}

impl<'a> AgentFactory<'a> {
    pub fn new(tools: &'a SearchToolProvider) -> Self {
        Self { tools }
    }

    /// Build the three agents, all bound to the same search tools.
    ///
    /// Fails with [`StratAiError::Configuration`] when the search tools were
    /// not initialised; no agent is built in that case.
    pub fn create_agents(&self, company: &str, industry: &str) -> Result<AgentRoster, StratAiError> {
        let tools = self.tools.tool_set()?;

        let researcher = Agent {
            kind: AgentKind::IndustryResearcher,
            role: "Advanced Industry Analyst".to_string(),
            goal: format!(
                "Conduct comprehensive research on {industry} and {company}, identifying market trends, competitive landscape, and strategic opportunities"
            ),
            backstory: format!(
                "A seasoned industry analyst with deep expertise in {industry}, specializing in technological innovation and market dynamics."
            ),
            tools: tools.clone(),
            allow_delegation: true,
        };

        let strategist = Agent {
            kind: AgentKind::UseCaseStrategist,
            role: "AI Strategy Consultant".to_string(),
            goal: "Generate innovative, data-driven AI/ML use cases with clear business value and implementation strategies".to_string(),
            backstory: "A strategic technology consultant who transforms complex business challenges into actionable AI solutions, drawing from extensive cross-industry experience.".to_string(),
            tools: tools.clone(),
            allow_delegation: true,
        };

        let curator = Agent {
            kind: AgentKind::ResourceCurator,
            role: "AI Resource Curator".to_string(),
            goal: "Identify and compile cutting-edge datasets, research papers, and implementation resources for proposed AI solutions".to_string(),
            backstory: "A meticulous technology researcher who discovers and validates the most relevant and recent technological resources across global platforms.".to_string(),
            tools,
            allow_delegation: true,
        };

        debug!(%company, %industry, "agents created");

        Ok(AgentRoster {
            researcher: Arc::new(researcher),
            strategist: Arc::new(strategist),
            curator: Arc::new(curator),
        })
    }
}
