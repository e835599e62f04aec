//! The fixed three-task research pipeline.

use std::sync::Arc;

use crate::agents::{Agent, AgentRoster};
use crate::output::TaskOutput;

/// One unit of work bound to exactly one agent.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: &'static str,
    pub description: String,
    pub expected_output: String,
    pub agent: Arc<Agent>,
}

impl Task {
    /// Prompt handed to the agent: the assignment, its acceptance criteria and
    /// the outputs of every earlier task.
    pub fn prompt(&self, context: &[TaskOutput]) -> String {
        let mut prompt = format!(
            "{}\n\nThis is the expected criteria for your final answer: {}\n\
             You MUST return the actual complete content as the final answer, not a summary.\n\
             Format the answer in Markdown. Put every section title on its own paragraph \
             starting with '###' and every sub-section title on its own paragraph starting \
             with '####'. Separate paragraphs with a blank line.",
            self.description, self.expected_output
        );

        if !context.is_empty() {
            let previous = context
                .iter()
                .map(|output| output.raw.as_str())
                .collect::<Vec<_>>()
                .join("\n\n----------\n\n");
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(&previous);
        }

        prompt
    }
}

/// Build the research, use-case and resource tasks, in that order.
pub fn create_tasks(roster: &AgentRoster, company: &str, industry: &str) -> [Task; 3] {
    [
        Task {
            id: "research",
            description: format!(
                "Conduct comprehensive analysis of {company} in the {industry} sector"
            ),
            expected_output: "Detailed industry and company analysis report".to_string(),
            agent: roster.researcher.clone(),
        },
        Task {
            id: "use_cases",
            description: format!("Generate AI/ML use cases for {company} in {industry}"),
            expected_output: "Innovative AI/ML use cases with implementation strategies"
                .to_string(),
            agent: roster.strategist.clone(),
        },
        Task {
            id: "resources",
            description: "Compile relevant resources and datasets".to_string(),
            expected_output: "Curated list of resources and implementation guides".to_string(),
            agent: roster.curator.clone(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentFactory, AgentKind};
    use crate::testing::stub_provider;

    fn roster() -> AgentRoster {
        AgentFactory::new(&stub_provider())
            .create_agents("Tata", "Automotive")
            .unwrap()
    }

    #[test]
    fn tasks_bind_one_agent_each_in_order() {
        let roster = roster();
        let tasks = create_tasks(&roster, "Tata", "Automotive");

        let ids: Vec<&str> = tasks.iter().map(|task| task.id).collect();
        assert_eq!(ids, vec!["research", "use_cases", "resources"]);

        let kinds: Vec<AgentKind> = tasks.iter().map(|task| task.agent.kind).collect();
        assert_eq!(kinds, AgentKind::ALL.to_vec());
        assert!(Arc::ptr_eq(&tasks[0].agent, &roster.researcher));
        assert!(Arc::ptr_eq(&tasks[2].agent, &roster.curator));
    }

    #[test]
    fn odd_inputs_still_yield_three_bound_tasks() {
        let provider = stub_provider();
        let long = "x".repeat(10_000);
        for (company, industry) in [("", ""), ("東京電力", "Énergie"), (long.as_str(), "ai")] {
            let roster = AgentFactory::new(&provider)
                .create_agents(company, industry)
                .unwrap();
            let tasks = create_tasks(&roster, company, industry);

            let ids: Vec<&str> = tasks.iter().map(|task| task.id).collect();
            assert_eq!(ids, vec!["research", "use_cases", "resources"]);
            for (task, agent) in tasks.iter().zip(roster.agents()) {
                assert!(Arc::ptr_eq(&task.agent, agent));
            }
            assert!(tasks[0].description.contains(company));
            assert!(tasks[1].description.contains(industry));
        }
    }

    #[test]
    fn descriptions_are_parameterised() {
        let tasks = create_tasks(&roster(), "Tata", "Automotive");
        assert_eq!(
            tasks[0].description,
            "Conduct comprehensive analysis of Tata in the Automotive sector"
        );
        assert_eq!(
            tasks[1].description,
            "Generate AI/ML use cases for Tata in Automotive"
        );
        assert_eq!(tasks[2].description, "Compile relevant resources and datasets");
    }

    #[test]
    fn prompt_includes_previous_outputs() {
        let tasks = create_tasks(&roster(), "Tata", "Automotive");
        let previous = TaskOutput {
            task_id: "research".into(),
            agent: AgentKind::IndustryResearcher,
            agent_role: "Advanced Industry Analyst".into(),
            description: tasks[0].description.clone(),
            raw: "### Market\n\nEV demand is rising".into(),
        };

        let first = tasks[0].prompt(&[]);
        assert!(!first.contains("context you're working with"));

        let second = tasks[1].prompt(std::slice::from_ref(&previous));
        assert!(second.starts_with("Generate AI/ML use cases for Tata in Automotive"));
        assert!(second.contains("Innovative AI/ML use cases with implementation strategies"));
        assert!(second.contains("EV demand is rising"));
    }
}
