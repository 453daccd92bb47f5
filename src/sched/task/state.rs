//! Estados e prioridades de processo

/// Estado de um processo
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ProcState {
    /// Entrada do pool sem dono
    Free = 0,
    /// Alocado, ainda não escalonado
    New,
    /// Numa fila de prontos
    Ready,
    /// O processo corrente
    Running,
    /// Na fila de sono até `wakeup`
    Sleeping,
    /// Esperando I/O (fila do dispositivo)
    Blocked,
    /// Esperando um filho terminar (fora de qualquer fila)
    Waiting,
    /// Marcado para morrer; recolhido no próximo schedule/dispatch
    Killed,
    /// Terminou; espera o `wait` do pai
    Zombie,
}

/// Quantidade de estados
pub const N_STATES: usize = 9;

impl ProcState {
    pub const ALL: [ProcState; N_STATES] = [
        Self::Free,
        Self::New,
        Self::Ready,
        Self::Running,
        Self::Sleeping,
        Self::Blocked,
        Self::Waiting,
        Self::Killed,
        Self::Zombie,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::New => "New",
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Sleeping => "Sleeping",
            Self::Blocked => "Blocked",
            Self::Waiting => "Waiting",
            Self::Killed => "Killed",
            Self::Zombie => "Zombie",
        }
    }

    /// Estados contados como processo ativo
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Free | Self::New)
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Classe de prioridade (0 = mais alta)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Priority {
    System = 0,
    User,
    Deferred,
}

impl Priority {
    pub const ALL: [Priority; super::super::config::N_PRIOS] =
        [Self::System, Self::User, Self::Deferred];

    pub const fn name(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
            Self::Deferred => "Deferred",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Prioridade vinda de uma syscall
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::System),
            1 => Some(Self::User),
            2 => Some(Self::Deferred),
            _ => None,
        }
    }
}
