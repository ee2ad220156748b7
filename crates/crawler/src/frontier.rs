//! Depth-tagged frontier of claimed publications awaiting processing

use citeforge_common::config::TraversalDiscipline;
use citeforge_common::PublicationId;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierItem {
    pub id: PublicationId,
    pub depth: u32,
}

/// Explicit work-list; never native recursion, whatever the discipline.
///
/// Breadth-first pops the oldest entry. Depth-first pops the newest, and
/// children are pushed in reverse so the first citation is explored first.
#[derive(Debug)]
pub struct Frontier {
    discipline: TraversalDiscipline,
    items: VecDeque<FrontierItem>,
}

impl Frontier {
    pub fn new(discipline: TraversalDiscipline) -> Self {
        Self {
            discipline,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, id: PublicationId, depth: u32) {
        self.items.push_back(FrontierItem { id, depth });
    }

    /// Push the children of one publication, preserving citation order
    pub fn extend_children(&mut self, children: Vec<PublicationId>, depth: u32) {
        match self.discipline {
            TraversalDiscipline::BreadthFirst => {
                for id in children {
                    self.push(id, depth);
                }
            }
            TraversalDiscipline::DepthFirst => {
                for id in children.into_iter().rev() {
                    self.push(id, depth);
                }
            }
        }
    }

    pub fn pop(&mut self) -> Option<FrontierItem> {
        match self.discipline {
            TraversalDiscipline::BreadthFirst => self.items.pop_front(),
            TraversalDiscipline::DepthFirst => self.items.pop_back(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::VersionPolicy;

    fn id(raw: &str) -> PublicationId {
        PublicationId::parse(raw, VersionPolicy::Collapse).unwrap()
    }

    fn drain(frontier: &mut Frontier) -> Vec<String> {
        std::iter::from_fn(|| frontier.pop())
            .map(|item| format!("{}@{}", item.id, item.depth))
            .collect()
    }

    #[test]
    fn test_breadth_first_is_fifo() {
        let mut frontier = Frontier::new(TraversalDiscipline::BreadthFirst);
        frontier.push(id("1000.00001"), 0);
        frontier.extend_children(vec![id("1000.00002"), id("1000.00003")], 1);

        assert_eq!(
            drain(&mut frontier),
            vec!["1000.00001@0", "1000.00002@1", "1000.00003@1"]
        );
    }

    #[test]
    fn test_depth_first_explores_first_child_first() {
        let mut frontier = Frontier::new(TraversalDiscipline::DepthFirst);
        frontier.extend_children(vec![id("1000.00002"), id("1000.00003")], 1);
        assert_eq!(frontier.pop().unwrap().id, id("1000.00002"));

        frontier.extend_children(vec![id("1000.00004")], 2);
        assert_eq!(drain(&mut frontier), vec!["1000.00004@2", "1000.00003@1"]);
        assert!(frontier.is_empty());
    }
}
