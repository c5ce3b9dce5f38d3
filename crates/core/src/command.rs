//! Command descriptors and executors

use std::fmt;

/// Who a permission is granted to when no explicit grant exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PermissionDefault {
    True,
    False,
    #[default]
    Op,
    NotOp,
}

/// A child permission inherited (or negated) through the parent node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildPermission {
    pub node: String,
    pub value: bool,
}

/// Node of a structured command grammar used for completion
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandNode {
    /// Fixed keyword, e.g. `add` in `/whitelist add <player>`
    Literal {
        name: String,
        children: Vec<CommandNode>,
    },
    /// Typed argument, e.g. `<player>`
    Argument {
        name: String,
        kind: ArgumentKind,
        children: Vec<CommandNode>,
    },
}

/// Argument value categories understood by client-side completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    Word,
    GreedyString,
    Integer,
    Float,
    Boolean,
    Player,
    Duration,
}

impl CommandNode {
    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn argument(name: impl Into<String>, kind: ArgumentKind) -> Self {
        Self::Argument {
            name: name.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Append a child node
    pub fn then(mut self, child: CommandNode) -> Self {
        match &mut self {
            Self::Literal { children, .. } | Self::Argument { children, .. } => children.push(child),
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Literal { name, .. } | Self::Argument { name, .. } => name,
        }
    }

    pub fn children(&self) -> &[CommandNode] {
        match self {
            Self::Literal { children, .. } | Self::Argument { children, .. } => children,
        }
    }
}

/// Immutable declaration of a command.
///
/// Empty `usage`, `description` and `permission` strings mean "not set" and
/// are not forwarded to the host command table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandDescriptor {
    name: String,
    aliases: Vec<String>,
    usage: String,
    description: String,
    permission: String,
    permission_default: PermissionDefault,
    children: Vec<ChildPermission>,
    player_only: bool,
    grammar: Option<CommandNode>,
}

impl CommandDescriptor {
    /// Start a descriptor for the named command
    pub fn builder(name: impl Into<String>) -> CommandDescriptorBuilder {
        CommandDescriptorBuilder {
            descriptor: Self {
                name: name.into(),
                aliases: Vec::new(),
                usage: String::new(),
                description: String::new(),
                permission: String::new(),
                permission_default: PermissionDefault::default(),
                children: Vec::new(),
                player_only: false,
                grammar: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn permission(&self) -> &str {
        &self.permission
    }

    pub fn permission_default(&self) -> PermissionDefault {
        self.permission_default
    }

    pub fn child_permissions(&self) -> &[ChildPermission] {
        &self.children
    }

    pub fn is_player_only(&self) -> bool {
        self.player_only
    }

    pub fn grammar(&self) -> Option<&CommandNode> {
        self.grammar.as_ref()
    }

    /// Name followed by every alias
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

impl fmt::Display for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name)
    }
}

/// Builder for [`CommandDescriptor`]
#[derive(Debug, Clone)]
pub struct CommandDescriptorBuilder {
    descriptor: CommandDescriptor,
}

impl CommandDescriptorBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.descriptor.aliases.push(alias.into());
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.descriptor.usage = usage.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    pub fn permission(mut self, permission: impl Into<String>, default: PermissionDefault) -> Self {
        self.descriptor.permission = permission.into();
        self.descriptor.permission_default = default;
        self
    }

    pub fn child_permission(mut self, node: impl Into<String>, value: bool) -> Self {
        self.descriptor.children.push(ChildPermission {
            node: node.into(),
            value,
        });
        self
    }

    pub fn player_only(mut self) -> Self {
        self.descriptor.player_only = true;
        self
    }

    pub fn grammar(mut self, grammar: CommandNode) -> Self {
        self.descriptor.grammar = Some(grammar);
        self
    }

    pub fn build(self) -> CommandDescriptor {
        self.descriptor
    }
}

/// The entity that issued a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSender {
    Console,
    Player { id: uuid::Uuid, name: String },
}

impl CommandSender {
    pub fn is_player(&self) -> bool {
        matches!(self, Self::Player { .. })
    }
}

/// Executor and tab completer of a single command
pub trait CommandExecutor: Send + Sync {
    /// Run the command. Returning `Ok(false)` asks the host to show usage.
    fn execute(&self, sender: &CommandSender, label: &str, args: &[String]) -> anyhow::Result<bool>;

    /// Suggestions for the argument currently being typed
    fn complete(&self, _sender: &CommandSender, _label: &str, _args: &[String]) -> Vec<String> {
        Vec::new()
    }
}
