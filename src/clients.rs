//! In-memory operations on the client hierarchy
//!
//! `ClientBook` wraps a loaded Clients collection and performs the mutations
//! callers make between `load` and `save`: creating records (minting their
//! numbers), changing task state, and soft-removing records into the parent's
//! `archived_*` lists so their numbers stay visible to later scans.

use chrono::{DateTime, Utc};

use crate::error::{EntityKind, Error, Result};
use crate::model::{timestamp, Amount, Charge, Client, Project, Task, TaskStatus};
use crate::numbering;

pub struct ClientBook<'a> {
    clients: &'a mut Vec<Client>,
}

impl<'a> ClientBook<'a> {
    pub fn new(clients: &'a mut Vec<Client>) -> Self {
        Self { clients }
    }

    pub fn client(&self, client_id: &str) -> Result<&Client> {
        self.clients
            .iter()
            .find(|c| c.id == client_id)
            .ok_or_else(|| Error::not_found(EntityKind::Client, client_id))
    }

    fn client_mut(&mut self, client_id: &str) -> Result<&mut Client> {
        self.clients
            .iter_mut()
            .find(|c| c.id == client_id)
            .ok_or_else(|| Error::not_found(EntityKind::Client, client_id))
    }

    // =========================================================================
    // Clients
    // =========================================================================

    /// Append a client, assigning the next client number.
    pub fn add_client(&mut self, mut client: Client) -> &Client {
        client.client_number = Some(numbering::next_client_number(&self.clients[..]));
        let idx = self.clients.len();
        self.clients.push(client);
        &self.clients[idx]
    }

    pub fn archive_client(&mut self, client_id: &str, now: DateTime<Utc>) -> Result<()> {
        let client = self.client_mut(client_id)?;
        client.archived = true;
        client.archived_at = Some(timestamp(now));
        Ok(())
    }

    pub fn restore_client(&mut self, client_id: &str) -> Result<()> {
        let client = self.client_mut(client_id)?;
        client.archived = false;
        client.archived_at = None;
        Ok(())
    }

    // =========================================================================
    // Projects
    // =========================================================================

    pub fn add_project(&mut self, client_id: &str, mut project: Project) -> Result<&Project> {
        let client = self.client_mut(client_id)?;
        project.project_number = Some(numbering::next_project_number(client));
        let idx = client.projects.len();
        client.projects.push(project);
        Ok(&client.projects[idx])
    }

    /// Move a project into the client's archived projects.
    pub fn remove_project(
        &mut self,
        client_id: &str,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Project> {
        let client = self.client_mut(client_id)?;
        let idx = client
            .projects
            .iter()
            .position(|p| p.id == project_id)
            .ok_or_else(|| Error::not_found(EntityKind::Project, project_id))?;

        let mut project = client.projects.remove(idx);
        project.archived_date = Some(timestamp(now));
        client.archived_projects.push(project.clone());
        Ok(project)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    /// Append a task. A project that has no number yet receives one first so
    /// the task number's prefix matches the project from now on.
    pub fn add_task(&mut self, client_id: &str, project_id: &str, mut task: Task) -> Result<&Task> {
        let client = self.client_mut(client_id)?;

        let project = client
            .project(project_id)
            .ok_or_else(|| Error::not_found(EntityKind::Project, project_id))?;
        let project_number = match &project.project_number {
            Some(number) => number.clone(),
            None => numbering::next_project_number(client),
        };
        if let Some(project) = client.project_mut(project_id) {
            project.project_number.get_or_insert(project_number);
        }

        let project = client
            .project(project_id)
            .ok_or_else(|| Error::not_found(EntityKind::Project, project_id))?;
        task.task_number = Some(numbering::next_task_number(client, project));
        task.done = task.status.is_done();

        let project = client
            .project_mut(project_id)
            .ok_or_else(|| Error::not_found(EntityKind::Project, project_id))?;
        let idx = project.tasks.len();
        project.tasks.push(task);
        Ok(&project.tasks[idx])
    }

    pub fn set_task_status(
        &mut self,
        client_id: &str,
        project_id: &str,
        task_id: &str,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<&Task> {
        let task = self.task_mut(client_id, project_id, task_id)?;
        task.done = status.is_done();
        task.completed_at = task.done.then(|| timestamp(now));
        task.status = status;
        Ok(&*task)
    }

    /// Move a task into the project's archived tasks and drop it from the
    /// dependency lists of the remaining tasks.
    pub fn remove_task(&mut self, client_id: &str, project_id: &str, task_id: &str) -> Result<Task> {
        let project = self.project_mut(client_id, project_id)?;
        let idx = project
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))?;

        let task = project.tasks.remove(idx);
        for sibling in &mut project.tasks {
            sibling.dependencies.retain(|dep| dep != task_id);
        }
        project.archived_tasks.push(task.clone());
        Ok(task)
    }

    fn project_mut(&mut self, client_id: &str, project_id: &str) -> Result<&mut Project> {
        self.client_mut(client_id)?
            .project_mut(project_id)
            .ok_or_else(|| Error::not_found(EntityKind::Project, project_id))
    }

    fn task_mut(&mut self, client_id: &str, project_id: &str, task_id: &str) -> Result<&mut Task> {
        self.project_mut(client_id, project_id)?
            .task_mut(task_id)
            .ok_or_else(|| Error::not_found(EntityKind::Task, task_id))
    }

    // =========================================================================
    // Charges
    // =========================================================================

    pub fn add_charge(&mut self, client_id: &str, mut charge: Charge) -> Result<&Charge> {
        let client = self.client_mut(client_id)?;
        charge.charge_number = Some(numbering::next_charge_number(client));
        let idx = client.extra_charges.len();
        client.extra_charges.push(charge);
        Ok(&client.extra_charges[idx])
    }

    /// Flip a charge's completed flag and return the new value.
    pub fn toggle_charge(&mut self, client_id: &str, charge_id: &str) -> Result<bool> {
        let charge = self.charge_mut(client_id, charge_id)?;
        charge.completed = !charge.completed;
        Ok(charge.completed)
    }

    pub fn set_charge_cost(
        &mut self,
        client_id: &str,
        charge_id: &str,
        our_cost: Amount,
    ) -> Result<()> {
        if our_cost.is_negative() {
            return Err(Error::InvalidArgument(format!(
                "our_cost must be a non-negative number, got {our_cost}"
            )));
        }
        self.charge_mut(client_id, charge_id)?.our_cost = our_cost;
        Ok(())
    }

    pub fn remove_charge(&mut self, client_id: &str, charge_id: &str) -> Result<Charge> {
        let client = self.client_mut(client_id)?;
        let idx = client
            .extra_charges
            .iter()
            .position(|c| c.id == charge_id)
            .ok_or_else(|| Error::not_found(EntityKind::Charge, charge_id))?;
        let charge = client.extra_charges.remove(idx);
        client.archived_charges.push(charge.clone());
        Ok(charge)
    }

    fn charge_mut(&mut self, client_id: &str, charge_id: &str) -> Result<&mut Charge> {
        self.client_mut(client_id)?
            .charge_mut(charge_id)
            .ok_or_else(|| Error::not_found(EntityKind::Charge, charge_id))
    }
}
